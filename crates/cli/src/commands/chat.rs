//! `warmline chat` — Interactive or single-message chat mode.
//!
//! Runs the same orchestration the gateway uses, against an in-memory
//! session store scoped to this process. Free credits, the greeting, and
//! the paywall all behave exactly as they do over HTTP.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use warmline_config::AppConfig;
use warmline_core::{ChatError, CompanionModel, CreditOutcome, Principal};
use warmline_engine::{ChatEngine, FALLBACK_REPLY, PersonaConfigurator};
use warmline_provider::CompletionClient;
use warmline_store::SessionStore;

pub async fn run(message: Option<String>) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;

    // Check for an API key early — give a clear error
    let Some(client) = CompletionClient::from_config(&config.model) else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GROQ_API_KEY=gsk_...       (recommended)");
        eprintln!("    WARMLINE_API_KEY=...       (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!(
            "    {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        eprintln!();
        anyhow::bail!("No API key found. See above for setup instructions.");
    };

    let model: Arc<dyn CompanionModel> = Arc::new(client);
    let store = Arc::new(SessionStore::new());
    let principal = Principal::Device("cli".into());
    let engine = ChatEngine::new(store.clone(), model);
    let configurator = PersonaConfigurator::new(store);

    let persona = configurator.persona(&principal).await?;

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let outcome = engine.send(&principal, &msg).await;
        eprint!("\r              \r");
        print_outcome(&persona.companion_name, outcome);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Warmline — Interactive Mode");
    println!();
    println!("  Companion: {} ({})", persona.companion_name, persona.personality);
    println!("  Model:     {}", config.model.model);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    if let Some(greeting) = configurator.ensure_greeting(&principal).await? {
        println!("  {} > {}", persona.companion_name, greeting.content);
        println!();
    }

    let stdin = std::io::stdin();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        eprint!("  ...");
        let outcome = engine.send(&principal, line).await;
        eprint!("\r     \r");
        print_outcome(&persona.companion_name, outcome);
        println!();
    }

    Ok(())
}

fn print_outcome(companion: &str, outcome: Result<warmline_engine::ChatReply, ChatError>) {
    match outcome {
        Ok(reply) => {
            println!("  {} > {}", companion, reply.reply.content);
            if let CreditOutcome::Remaining(n) = reply.balance {
                if n <= 5 {
                    println!("  ({n} free messages left)");
                }
            }
        }
        Err(ChatError::Exhausted) => {
            println!("  [Paywall] You're out of free messages — purchase credits to keep chatting.");
        }
        Err(ChatError::Upstream(_)) => {
            // The apology is display-only; it never enters the log.
            println!("  {} > {}", companion, FALLBACK_REPLY);
        }
        Err(e) => {
            eprintln!("  [Error] {e}");
        }
    }
}
