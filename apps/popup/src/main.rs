use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{SpeechEngine, HttpBackend, SessionController, VideoChat, VoiceAssistant};
use storage::SqliteStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod dispatch;
mod events;
mod host;
mod view;

use commands::{parse_shell_line, PopupCommand, ShellCommand};
use config::{load_settings, normalize_database_url};
use dispatch::{dispatch_command, restored_session_events, App};
use events::{UiError, UiErrorContext, UiEvent};
use host::ConsoleSpeech;

#[derive(Parser, Debug)]
#[command(name = "popup", version, about = "Document risk analyzer client")]
struct Cli {
    /// Config file (defaults to ./popup.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    #[command(flatten)]
    Popup(PopupCommand),
    /// Interactive session; each line runs as its own command.
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }

    let database_url = normalize_database_url(&settings.database_url);
    let store = match open_store(&database_url).await {
        Ok(store) => store,
        Err(err) => {
            error!(%database_url, error = %err, "failed to open session store");
            view::print_event(&UiEvent::Error(UiError::input(
                UiErrorContext::Startup,
                format!("Failed to open the session store: {err:#}"),
            )));
            std::process::exit(1);
        }
    };

    let timeout = settings.request_timeout();
    let analyzer = HttpBackend::new(&settings.api_url, timeout)?;
    let voice_backend = HttpBackend::new(&settings.voice_api_url, timeout)?;
    let video_backend = HttpBackend::new(&settings.video_api_url, timeout)?;

    let controller = SessionController::new(Arc::new(analyzer), Arc::new(store))
        .with_min_page_text_len(settings.min_page_text_len);
    let restored = controller.restore().await;

    let app = App {
        controller: Arc::new(controller),
        voice: Arc::new(VoiceAssistant::new(
            Arc::new(voice_backend),
            ConsoleSpeech::new(settings.speech_wpm),
        )),
        video: Arc::new(VideoChat::new(Arc::new(video_backend))),
        interactive: false,
    };
    info!(api_url = %settings.api_url, %database_url, "popup ready");

    for event in restored_session_events(restored) {
        view::print_event(&event);
    }

    match cli.command {
        Some(CliCommand::Popup(command)) => run_once(app, command).await,
        Some(CliCommand::Shell) | None => run_shell(App {
            interactive: true,
            ..app
        })
        .await
        .context("shell failed"),
    }
}

async fn open_store(database_url: &str) -> Result<SqliteStore> {
    let store = SqliteStore::new(database_url).await?;
    store
        .health_check()
        .await
        .context("session store is not usable")?;
    Ok(store)
}

async fn run_once(app: App<ConsoleSpeech>, command: PopupCommand) -> Result<()> {
    let is_voice = matches!(command, PopupCommand::Voice { .. });
    let events = dispatch_command(&app, command).await;
    let failed = events.iter().any(|event| matches!(event, UiEvent::Error(_)));
    for event in &events {
        view::print_event(event);
    }
    if is_voice {
        wait_for_speech(&app).await;
    }
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Keeps the process alive while a reply is spoken; Ctrl-C cuts it short.
async fn wait_for_speech(app: &App<ConsoleSpeech>) {
    let engine = app.voice.narrator().engine();
    tokio::select! {
        _ = async {
            while engine.is_speaking() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        } => {}
        _ = tokio::signal::ctrl_c() => app.voice.stop(),
    }
}

async fn run_shell(app: App<ConsoleSpeech>) -> std::io::Result<()> {
    println!("Type a command (upload, paste, tab, analyze, ask, delete, show, documents, status, voice, replay, stop, video) or 'quit'.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_shell_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ShellCommand::Quit)) => break,
                    Ok(Some(ShellCommand::Popup(command))) => {
                        let app = app.clone();
                        tokio::spawn(async move {
                            for event in dispatch_command(&app, command).await {
                                view::print_event(&event);
                            }
                        });
                    }
                    Err(usage) => view::print_event(&UiEvent::Error(UiError::input(
                        UiErrorContext::General,
                        usage.trim_end(),
                    ))),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                if app.voice.narrator().engine().is_speaking() {
                    app.voice.stop();
                } else {
                    break;
                }
            }
        }
    }
    app.voice.stop();
    Ok(())
}
