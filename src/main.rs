//! Persona chat terminal front-end
//!
//! Loads a model on an `OpenAI`-compatible local server and chats as the
//! configured persona over stdin/stdout.

use persona_chat::engine::{all_models, ModelChoice, OpenAICompatLauncher};
use persona_chat::{AppConfig, ConversationTurn, LoadProgress, PersonaConfig, SessionManager};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "Commands: /models, /model <id>, /reset, /help, /quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout is reserved for the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persona_chat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_env()?;

    let mut persona = PersonaConfig::new(config.persona_name.clone(), String::new());
    for path in &config.training_files {
        persona.import_training_file(path)?;
    }

    let launcher = OpenAICompatLauncher::new(
        &config.engine_url,
        config.engine_api_key.clone(),
        config.request_timeout,
    )?;
    tracing::info!(url = %launcher.base_url(), "Using OpenAI-compatible engine");
    let manager = SessionManager::new(Arc::new(launcher), config.session_config());

    load(&manager, &config.model).await;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<ConversationTurn> = Vec::new();

    stdout
        .write_all(format!("Chatting with {}. {HELP}\n", persona.name).as_bytes())
        .await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit" | "/exit", _) => break,
            ("/help", _) => stdout.write_all(format!("{HELP}\n").as_bytes()).await?,
            ("/models", _) => {
                let mut listing = String::new();
                for def in all_models() {
                    listing.push_str(&format!(
                        "  {} - {} ({})\n",
                        def.id, def.display_name, def.approximate_size
                    ));
                }
                listing.push_str("  or any custom id the server knows\n");
                stdout.write_all(listing.as_bytes()).await?;
            }
            ("/model", id) => load(&manager, id).await,
            ("/reset", _) => {
                history.clear();
                stdout.write_all(b"History cleared.\n").await?;
            }
            _ => {
                history.push(ConversationTurn::user(line));
                let reply = manager.respond(&history, &persona).await;
                stdout
                    .write_all(format!("{}: {reply}\n", persona.name).as_bytes())
                    .await?;
                history.push(ConversationTurn::assistant(reply));
            }
        }
        stdout.flush().await?;
    }

    Ok(())
}

/// Load a model, printing progress. Failures are reported, not fatal.
async fn load(manager: &SessionManager, id: &str) {
    let choice = ModelChoice::parse(id);
    let key = match choice.resolve() {
        Ok(key) => key,
        Err(e) => {
            eprintln!("[load] {e}");
            return;
        }
    };

    eprintln!("[load] {}", choice.label());
    let print = |progress: LoadProgress| eprintln!("[load] {progress}");
    if manager.ensure_model_loaded(&key, &print).await.is_err() {
        eprintln!("[load] Loading failed. Check the engine server and try /model again.");
    }
}
