//! Talkstream CLI: drive a talking-avatar session from the terminal.
//!
//! Usage:
//!   talkstream [--config api.json] session     Interactive shell (connect / destroy / status / quit, anything else is spoken)
//!   talkstream [--config api.json] credits     Print remaining avatar service credits
//!   talkstream [--config api.json] ask "..."   One text-service completion, no avatar
//!
//! Keys come from the config file (`key`, `openai_key`) or `TALKSTREAM__KEY` / `TALKSTREAM__OPENAI_KEY`.

use std::path::PathBuf;
use std::sync::Arc;
use talkstream_core::{
    DidSignalingClient, OpenAiTextClient, SessionConfig, SessionController, SessionEvent, SessionResult,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

enum Command {
    Session,
    Credits,
    Ask(String),
}

fn usage() {
    eprintln!("Talkstream - talking-avatar session shell");
    eprintln!("  talkstream [--config PATH] session        Interactive session");
    eprintln!("  talkstream [--config PATH] credits        Show avatar service credits");
    eprintln!("  talkstream [--config PATH] ask \"PROMPT\"   Ask the text service once");
    eprintln!();
    eprintln!("Config: --config, TALKSTREAM_CONFIG, or ./api.json; TALKSTREAM__* env overrides.");
}

fn parse_args() -> Option<(Option<PathBuf>, Command)> {
    let mut args = std::env::args().skip(1);
    let mut config_path = None;
    let mut command = None;

    while let Some(a) = args.next() {
        match a.as_str() {
            "--config" => config_path = args.next().map(PathBuf::from),
            "session" => command = Some(Command::Session),
            "credits" => command = Some(Command::Credits),
            "ask" => {
                let prompt: Vec<String> = args.by_ref().collect();
                command = Some(Command::Ask(prompt.join(" ")));
            }
            _ => return None,
        }
    }
    command.map(|c| (config_path, c))
}

fn load_config(path: Option<PathBuf>) -> SessionResult<SessionConfig> {
    match path {
        Some(path) => SessionConfig::load_from_path(&path),
        None => SessionConfig::load(),
    }
}

#[tokio::main]
async fn main() -> CliResult<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[talkstream] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some((config_path, command)) = parse_args() else {
        usage();
        return Ok(());
    };
    let config = load_config(config_path)?;

    match command {
        Command::Credits => {
            let credits = DidSignalingClient::from_config(&config).credits().await?;
            println!(
                "remaining: {}  total: {}",
                credits.remaining.map_or("?".to_string(), |n| n.to_string()),
                credits.total.map_or("?".to_string(), |n| n.to_string()),
            );
        }
        Command::Ask(prompt) => {
            if prompt.trim().is_empty() {
                usage();
                return Ok(());
            }
            let reply = OpenAiTextClient::from_config(&config).try_complete(prompt.trim()).await?;
            println!("{}", reply);
        }
        Command::Session => run_session(config).await?,
    }
    Ok(())
}

async fn run_session(config: SessionConfig) -> CliResult<()> {
    let controller = Arc::new(SessionController::from_config(config)?);
    let watcher = tokio::spawn(log_events(controller.subscribe()));

    tracing::info!(
        voice_id = %controller.config().voice_id,
        "Session shell ready: connect, destroy, status, quit; any other line is spoken"
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => continue,
                    "quit" | "exit" => break,
                    "connect" => {
                        if let Err(e) = controller.connect().await {
                            tracing::warn!(error = %e, "connect failed");
                        }
                    }
                    "destroy" => controller.destroy().await,
                    "status" => {
                        let state = controller.state().await;
                        let stream = controller.stream().await;
                        let transport = controller.connection_state().await;
                        let playback = controller.playback().await;
                        println!(
                            "state: {}  stream: {}  transport: {}  playing: {}",
                            state,
                            stream.map_or("-".to_string(), |s| s.stream_id),
                            transport.as_deref().unwrap_or("-"),
                            playback.map_or(false, |p| p.is_playing),
                        );
                    }
                    text => match controller.speak(text).await {
                        Ok(reply) => println!("avatar: {}", reply),
                        Err(e) => tracing::warn!(error = %e, "speak failed"),
                    },
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; closing session");
                break;
            }
        }
    }

    controller.destroy().await;
    watcher.abort();
    Ok(())
}

async fn log_events(mut rx: tokio::sync::broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::State { state }) => tracing::info!(%state, "session"),
            Ok(SessionEvent::Status(update)) => {
                tracing::info!(channel = %update.channel, state = %update.state, "status")
            }
            Ok(SessionEvent::Video { view }) => tracing::info!(?view, "video"),
            Err(RecvError::Lagged(n)) => tracing::debug!(skipped = n, "event watcher lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
