//! SkyBeam Chat - streaming AI assistant chat for SkyBeam Studio
//!
//! Two modes:
//! - default: terminal chat against the inference gateway, with
//!   conversation persistence in SQLite
//! - --serve: run the gateway relay (persona prompt selection + SSE
//!   passthrough) and the conversation history API

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use skybeam_chat::config::Config;
use skybeam_chat::gateway::GatewayClient;
use skybeam_chat::persona::Assistant;
use skybeam_chat::repl;
use skybeam_chat::server::{self, AppState, DEFAULT_MODEL};
use skybeam_chat::session::{ChatStore, SessionManager};

#[derive(Parser)]
#[command(name = "skybeam-chat")]
#[command(about = "Streaming AI assistant chat for SkyBeam Studio")]
struct Args {
    /// Run the HTTP relay instead of the terminal client
    #[arg(long)]
    serve: bool,

    /// Relay port
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Relay bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Database path (sqlite URL)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Inference gateway endpoint (terminal client)
    #[arg(long, env = "SKYBEAM_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Bearer token for the gateway
    #[arg(long, env = "SKYBEAM_GATEWAY_API_KEY")]
    gateway_api_key: Option<String>,

    /// Upstream completions endpoint (relay)
    #[arg(long, env = "UPSTREAM_API_URL")]
    upstream_url: Option<String>,

    /// Bearer token for the upstream API
    #[arg(long, env = "UPSTREAM_API_KEY")]
    upstream_api_key: Option<String>,

    /// Model requested from the upstream API
    #[arg(long)]
    model: Option<String>,

    /// Assistant persona (oracle/aether/muse/ascend)
    #[arg(long, short = 'a')]
    assistant: Option<String>,

    /// User id recorded on conversations
    #[arg(long, env = "SKYBEAM_USER_ID")]
    user: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (from ~/.skybeam/.env or current dir)
    let env_path = dirs::home_dir()
        .map(|h| h.join(".skybeam").join(".env"))
        .filter(|p| p.exists());
    if let Some(path) = env_path {
        let _ = dotenvy::from_path(&path);
    } else {
        let _ = dotenvy::dotenv();
    }

    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Resolve values: CLI args > env vars (handled by clap) > config file > defaults
    let config = Config::load();

    let database_url = args
        .database_url
        .or(config.database_url)
        .unwrap_or_else(|| "sqlite://skybeam.db?mode=rwc".to_string());

    let store = ChatStore::connect(&database_url).await?;

    if args.serve {
        let upstream_url = args
            .upstream_url
            .or(config.upstream_url)
            .expect("UPSTREAM_API_URL required for --serve (set via --upstream-url, env var, or ~/.skybeam/config.toml)");
        let upstream_api_key = args
            .upstream_api_key
            .or(config.upstream_api_key)
            .expect("UPSTREAM_API_KEY required for --serve (set via --upstream-api-key, env var, or ~/.skybeam/config.toml)");
        let model = args
            .model
            .or(config.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let state = AppState {
            store,
            http: reqwest::Client::new(),
            upstream_url,
            upstream_api_key,
            model,
        };
        return server::run(&args.host, args.port, state).await;
    }

    let gateway_url = args
        .gateway_url
        .or(config.gateway_url)
        .unwrap_or_else(|| "http://localhost:3000/api/chat".to_string());
    let gateway_api_key = args.gateway_api_key.or(config.gateway_api_key);

    let assistant = args
        .assistant
        .or(config.assistant)
        .map(|s| Assistant::from_id_or_default(&s))
        .unwrap_or_default();

    let user_id = args
        .user
        .or(config.user_id)
        .unwrap_or_else(|| "local".to_string());

    let gateway = GatewayClient::new(gateway_url, gateway_api_key);
    let manager = SessionManager::new(store, gateway, assistant, user_id);

    repl::run(manager).await
}
