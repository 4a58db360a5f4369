// src/repl.rs
// Terminal chat client.
//
// Streams assistant deltas to stdout as they arrive; Ctrl-C during a turn
// cancels the stream and discards the placeholder.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::persona::Assistant;
use crate::session::{SessionManager, TurnEvent};

/// Run the interactive chat loop until /quit or EOF.
pub async fn run(mut manager: SessionManager) -> Result<()> {
    print_banner(manager.assistant());

    let mut rl = DefaultEditor::new()?;
    loop {
        let prompt = format!("{}> ", manager.assistant().id());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                if line.starts_with('/') {
                    if handle_command(&mut manager, &line).await? {
                        break;
                    }
                    continue;
                }

                run_turn(&mut manager, &line).await;
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Run one turn, printing deltas live. Ctrl-C cancels.
async fn run_turn(manager: &mut SessionManager, line: &str) {
    let (tx, mut rx) = mpsc::channel::<TurnEvent>(100);
    let cancelled = Arc::new(AtomicBool::new(false));

    let printer = tokio::spawn(async move {
        let mut printed_any = false;
        while let Some(event) = rx.recv().await {
            match event {
                TurnEvent::TextDelta { delta } => {
                    if !printed_any {
                        println!();
                        printed_any = true;
                    }
                    print!("{}", delta);
                    let _ = io::stdout().flush();
                }
                TurnEvent::ConversationCreated { conversation } => {
                    println!("  [new conversation: {}]", conversation.title);
                }
                TurnEvent::Reconciled { messages } => {
                    println!("\n  [reloaded {} messages from storage]", messages.len());
                }
                TurnEvent::Done { .. } | TurnEvent::Error { .. } => {}
            }
        }
        printed_any
    });

    // Keep polling the send future while listening for Ctrl-C; setting the
    // flag lets the manager unwind cleanly instead of dropping the turn
    // mid-await with its state stuck in Streaming. The future borrows tx,
    // so it must go out of scope before the channel can close.
    let result = {
        let send = manager.send(line, &tx, &cancelled);
        tokio::pin!(send);
        loop {
            tokio::select! {
                res = &mut send => break res,
                _ = tokio::signal::ctrl_c() => {
                    cancelled.store(true, Ordering::SeqCst);
                }
            }
        }
    };

    drop(tx);
    let printed_any = printer.await.unwrap_or(false);

    match result {
        Ok(_) => {
            if printed_any {
                println!("\n");
            } else {
                println!("  [no response]");
            }
        }
        Err(ChatError::Cancelled) => println!("\n  [cancelled]"),
        Err(e) => eprintln!("\nerror: {}", e.user_message()),
    }
}

/// Handle a slash command. Returns true to exit the loop.
async fn handle_command(manager: &mut SessionManager, line: &str) -> Result<bool> {
    let mut parts = line.splitn(2, ' ');
    let command = parts.next().unwrap_or("");
    let arg = parts.next().unwrap_or("").trim();

    match command {
        "/quit" | "/exit" => return Ok(true),
        "/help" => {
            println!("  /assistants          list the assistant team");
            println!("  /assistant <name>    switch assistant (starts a new conversation)");
            println!("  /history             show the current conversation");
            println!("  /quit                exit");
        }
        "/assistants" => {
            for assistant in Assistant::ALL {
                let marker = if assistant == manager.assistant() { "*" } else { " " };
                println!(
                    "  {} {:<8} {} - {}",
                    marker,
                    assistant.id(),
                    assistant.role(),
                    assistant.description()
                );
            }
        }
        "/assistant" => match arg.parse::<Assistant>() {
            Ok(assistant) => {
                manager.switch_assistant(assistant);
                print_banner(assistant);
            }
            Err(()) => eprintln!("unknown assistant: {} (try /assistants)", arg),
        },
        "/history" => {
            let messages = manager.history().await?;
            if messages.is_empty() {
                println!("  (no messages yet)");
            }
            for message in messages {
                println!("  [{}] {}", message.role, message.content);
            }
        }
        other => eprintln!("unknown command: {} (try /help)", other),
    }

    Ok(false)
}

fn print_banner(assistant: Assistant) {
    println!("\n{} - {}", assistant.name(), assistant.role());
    println!("{}\n", assistant.description());
    println!("Try:");
    for suggestion in assistant.suggestions() {
        println!("  - {}", suggestion);
    }
    println!();
}
