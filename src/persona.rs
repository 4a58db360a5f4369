// src/persona.rs
// Assistant personas for the SkyBeam Studio AI team.
// Each persona is a named system-prompt configuration; the relay selects
// the prompt server-side from the assistant_type field on the request.

use serde::{Deserialize, Serialize};

/// The fixed set of assistant personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assistant {
    /// Strategic advisor - executive insights and decision support
    Oracle,
    /// Technical expert - code review and development guidance
    Aether,
    /// Creative director - campaigns, content, brand voice
    Muse,
    /// Growth strategist - leads, sales, conversion
    Ascend,
}

impl Assistant {
    /// All personas, in sidebar order.
    pub const ALL: [Assistant; 4] = [
        Assistant::Oracle,
        Assistant::Aether,
        Assistant::Muse,
        Assistant::Ascend,
    ];

    /// Wire identifier used as `assistant_type` on gateway requests.
    pub fn id(&self) -> &'static str {
        match self {
            Assistant::Oracle => "oracle",
            Assistant::Aether => "aether",
            Assistant::Muse => "muse",
            Assistant::Ascend => "ascend",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Assistant::Oracle => "Oracle",
            Assistant::Aether => "Aether",
            Assistant::Muse => "Muse",
            Assistant::Ascend => "Ascend",
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Assistant::Oracle => "Strategic Advisor",
            Assistant::Aether => "Technical Expert",
            Assistant::Muse => "Creative Director",
            Assistant::Ascend => "Growth Strategist",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Assistant::Oracle => {
                "Executive insights, data analysis, and strategic decision support"
            }
            Assistant::Aether => {
                "Code review, technical guidance, and development best practices"
            }
            Assistant::Muse => "Campaign ideas, content creation, and brand voice guidance",
            Assistant::Ascend => "Lead analysis, sales optimization, and conversion strategies",
        }
    }

    pub fn capabilities(&self) -> &'static [&'static str] {
        match self {
            Assistant::Oracle => &[
                "Executive summaries",
                "Data analysis",
                "Strategic recommendations",
                "Risk assessment",
            ],
            Assistant::Aether => &[
                "Code review",
                "Architecture advice",
                "Bug analysis",
                "Performance optimization",
            ],
            Assistant::Muse => &[
                "Campaign concepts",
                "Content writing",
                "Visual direction",
                "Brand consistency",
            ],
            Assistant::Ascend => &[
                "Lead scoring",
                "Sales outreach",
                "Funnel optimization",
                "Conversion analysis",
            ],
        }
    }

    /// Conversation starters shown when a chat is empty.
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Assistant::Oracle => &[
                "Generate a weekly executive summary",
                "Analyze our Q4 performance",
                "What are our top priorities this month?",
            ],
            Assistant::Aether => &[
                "Review my React component for best practices",
                "How should I structure this API endpoint?",
                "Optimize this database query",
            ],
            Assistant::Muse => &[
                "Generate 5 Instagram post ideas for our client",
                "Write engaging captions for a product launch",
                "Create a content calendar for February",
            ],
            Assistant::Ascend => &[
                "Analyze this lead for conversion potential",
                "Draft a follow-up email for a warm prospect",
                "What can we improve in our sales funnel?",
            ],
        }
    }

    /// System prompt for this persona.
    pub fn prompt(&self) -> &'static str {
        match self {
            Assistant::Oracle => ORACLE_PROMPT,
            Assistant::Aether => AETHER_PROMPT,
            Assistant::Muse => MUSE_PROMPT,
            Assistant::Ascend => ASCEND_PROMPT,
        }
    }

    /// Resolve a wire identifier, falling back to Oracle for anything
    /// unrecognized (matching the gateway's server-side behavior).
    pub fn from_id_or_default(id: &str) -> Assistant {
        id.parse().unwrap_or(Assistant::Oracle)
    }
}

impl Default for Assistant {
    fn default() -> Self {
        Assistant::Oracle
    }
}

impl std::fmt::Display for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for Assistant {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oracle" => Ok(Assistant::Oracle),
            "aether" => Ok(Assistant::Aether),
            "muse" => Ok(Assistant::Muse),
            "ascend" => Ok(Assistant::Ascend),
            _ => Err(()),
        }
    }
}

const ORACLE_PROMPT: &str = r#"You are Oracle, a strategic advisor AI assistant at SkyBeam Studio. Your expertise includes:
- Executive summaries and business insights
- Data analysis and interpretation
- Strategic recommendations and planning
- Risk assessment and mitigation
You provide thoughtful, data-driven advice to help leadership make informed decisions."#;

const AETHER_PROMPT: &str = r#"You are Aether, a technical expert AI assistant at SkyBeam Studio. Your expertise includes:
- Code review and best practices
- Software architecture advice
- Bug analysis and debugging
- Performance optimization
You help developers write better code and solve technical challenges."#;

const MUSE_PROMPT: &str = r#"You are Muse, a creative director AI assistant at SkyBeam Studio. Your expertise includes:
- Campaign concepts and creative ideas
- Content writing and copywriting
- Visual direction and brand consistency
- Social media strategy
You inspire creative solutions and help craft compelling content."#;

const ASCEND_PROMPT: &str = r#"You are Ascend, a growth strategist AI assistant at SkyBeam Studio. Your expertise includes:
- Lead scoring and qualification
- Sales outreach strategies
- Funnel optimization
- Conversion analysis
You help optimize sales processes and drive business growth."#;
