//! Runs one popup command against the controller and assistants.

use std::{path::Path, sync::Arc};

use client_core::{
    AnalysisOutcome, ContentSubmission, PageSource, Session, SessionController, SpeechEngine,
    VideoChat, VoiceAssistant,
};
use tracing::debug;

use crate::{
    commands::PopupCommand,
    events::{UiError, UiErrorContext, UiEvent},
    host::FilePageSource,
};

pub struct App<E> {
    pub controller: Arc<SessionController>,
    pub voice: Arc<VoiceAssistant<E>>,
    pub video: Arc<VideoChat>,
    /// Commands come from the shell, so stdin is not available as input.
    pub interactive: bool,
}

impl<E> Clone for App<E> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            voice: Arc::clone(&self.voice),
            video: Arc::clone(&self.video),
            interactive: self.interactive,
        }
    }
}

pub async fn dispatch_command<E: SpeechEngine>(app: &App<E>, command: PopupCommand) -> Vec<UiEvent> {
    debug!(command = command.name(), "dispatching command");
    if app.interactive && command.reads_stdin() {
        return vec![UiEvent::Error(UiError::input(
            UiErrorContext::General,
            format!(
                "'{}' needs text or a file path inside the shell.",
                command.name()
            ),
        ))];
    }

    match command {
        PopupCommand::Upload { path } => {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            match read_file(&path).await {
                Ok(bytes) => submit(app, ContentSubmission::File { filename, bytes }).await,
                Err(message) => input_error(UiErrorContext::Submit, message),
            }
        }
        PopupCommand::Paste { filename, text } => {
            let text = if text.is_empty() {
                match FilePageSource::new(None, None).visible_text().await {
                    Ok(snapshot) => snapshot.text,
                    Err(err) => return input_error(UiErrorContext::Submit, format!("{err:#}")),
                }
            } else {
                text.join(" ")
            };
            submit(app, ContentSubmission::PastedText { text, filename }).await
        }
        PopupCommand::Tab { title, path } => {
            match FilePageSource::new(path, title).visible_text().await {
                Ok(snapshot) => submit(app, ContentSubmission::ActiveTab(snapshot)).await,
                Err(err) => input_error(UiErrorContext::Submit, format!("{err:#}")),
            }
        }
        PopupCommand::Analyze => match app.controller.run_analysis().await {
            Ok(AnalysisOutcome::Completed(report)) => vec![UiEvent::AnalysisReady(report)],
            Ok(AnalysisOutcome::NoDocument) => {
                vec![UiEvent::Info("Please load a document first.".to_string())]
            }
            Ok(AnalysisOutcome::AlreadyRunning) => {
                vec![UiEvent::Info("Risk analysis is already running.".to_string())]
            }
            Err(err) => session_error(UiErrorContext::Analyze, &err),
        },
        PopupCommand::Ask { question } => match app.controller.ask(&question.join(" ")).await {
            Ok(answer) => vec![UiEvent::Answer(answer)],
            Err(err) => session_error(UiErrorContext::Ask, &err),
        },
        PopupCommand::Delete => match app.controller.delete_session().await {
            Ok(outcome) => vec![UiEvent::Deleted(outcome)],
            Err(err) => session_error(UiErrorContext::Delete, &err),
        },
        PopupCommand::Show => vec![UiEvent::SessionShown(app.controller.snapshot().await)],
        PopupCommand::Documents => match app.controller.list_documents().await {
            Ok(documents) => vec![UiEvent::Documents(documents)],
            Err(err) => session_error(UiErrorContext::Listing, &err),
        },
        PopupCommand::Status => match app.controller.service_info().await {
            Ok(info) => vec![UiEvent::Status(info)],
            Err(err) => session_error(UiErrorContext::Status, &err),
        },
        PopupCommand::Voice { from, text } => {
            let selection = if text.is_empty() {
                match FilePageSource::new(from, None).selected_text().await {
                    Ok(selection) => selection,
                    Err(err) => return input_error(UiErrorContext::Voice, format!("{err:#}")),
                }
            } else {
                text.join(" ")
            };
            match app.voice.process_selection(&selection).await {
                Ok(reply) => vec![UiEvent::VoiceReply(reply)],
                Err(err) => session_error(UiErrorContext::Voice, &err),
            }
        }
        PopupCommand::Replay => {
            if app.voice.replay() {
                Vec::new()
            } else {
                vec![UiEvent::Info("Nothing to replay yet.".to_string())]
            }
        }
        PopupCommand::Stop => {
            app.voice.stop();
            Vec::new()
        }
        PopupCommand::Video { video_id, question } => {
            match app.video.ask(&video_id, &question.join(" ")).await {
                Ok(answer) => vec![UiEvent::VideoAnswer {
                    video_id: video_id.trim().into(),
                    answer,
                }],
                Err(err) => session_error(UiErrorContext::Video, &err),
            }
        }
    }
}

/// What reopening the popup shows: the loaded document and, when it still
/// matches, its cached analysis.
pub fn restored_session_events(restored: Session) -> Vec<UiEvent> {
    if restored.has_document() {
        vec![UiEvent::SessionShown(restored)]
    } else {
        Vec::new()
    }
}

async fn submit<E>(app: &App<E>, content: ContentSubmission) -> Vec<UiEvent> {
    match app.controller.submit_content(content).await {
        Ok(document) => vec![UiEvent::DocumentReady(document)],
        Err(err) => session_error(UiErrorContext::Submit, &err),
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    tokio::fs::read(path)
        .await
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))
}

fn session_error(context: UiErrorContext, err: &client_core::SessionError) -> Vec<UiEvent> {
    vec![UiEvent::Error(UiError::from_session(context, err))]
}

fn input_error(context: UiErrorContext, message: impl Into<String>) -> Vec<UiEvent> {
    vec![UiEvent::Error(UiError::input(context, message))]
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
