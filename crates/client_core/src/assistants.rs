//! Single-purpose assistants: spoken replies to selected text, and video Q&A.

use std::sync::Arc;

use shared::domain::{ChatMessage, VideoId};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    activity::{Activity, ActivityTracker},
    error::{Result, SessionError, ValidationError},
    host::{Narrator, SpeechEngine},
    ReplyBackend, VideoBackend,
};

const NO_TRANSCRIPT_MESSAGE: &str = "No transcript available for this video. Try another video.";

/// Sends selected page text to the reply service and speaks the answer.
pub struct VoiceAssistant<E> {
    backend: Arc<dyn ReplyBackend>,
    narrator: Narrator<E>,
    activity: ActivityTracker,
}

impl<E: SpeechEngine> VoiceAssistant<E> {
    pub fn new(backend: Arc<dyn ReplyBackend>, speech: E) -> Self {
        Self {
            backend,
            narrator: Narrator::new(speech),
            activity: ActivityTracker::new(),
        }
    }

    pub fn narrator(&self) -> &Narrator<E> {
        &self.narrator
    }

    pub fn activity(&self) -> Activity {
        self.activity.current()
    }

    pub async fn process_selection(&self, selection: &str) -> Result<String> {
        let selection = selection.trim();
        if selection.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }
        let _activity = self
            .activity
            .try_begin(Activity::Asking)
            .map_err(SessionError::Busy)?;

        info!(chars = selection.chars().count(), "requesting reply for selection");
        let reply = self
            .backend
            .reply(selection)
            .await
            .inspect_err(|err| warn!(error = %err, "voice reply failed"))?;
        self.narrator.speak(&reply);
        Ok(reply)
    }

    pub fn replay(&self) -> bool {
        self.narrator.replay()
    }

    pub fn stop(&self) {
        self.narrator.stop();
    }
}

/// Chat about a video's transcript.
pub struct VideoChat {
    backend: Arc<dyn VideoBackend>,
    history: Mutex<Vec<ChatMessage>>,
    activity: ActivityTracker,
}

impl VideoChat {
    pub fn new(backend: Arc<dyn VideoBackend>) -> Self {
        Self {
            backend,
            history: Mutex::new(Vec::new()),
            activity: ActivityTracker::new(),
        }
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }

    pub async fn ask(&self, video_id: &str, question: &str) -> Result<String> {
        let video_id = video_id.trim();
        if video_id.is_empty() {
            return Err(ValidationError::EmptyVideoId.into());
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(ValidationError::EmptyQuestion.into());
        }
        let _activity = self
            .activity
            .try_begin(Activity::Asking)
            .map_err(SessionError::Busy)?;

        self.history.lock().await.push(ChatMessage::user(question));
        let video_id = VideoId::from(video_id);
        info!(%video_id, "asking about video");

        match self.backend.ask_video(&video_id, question).await {
            Ok(answer) => {
                self.history.lock().await.push(ChatMessage::bot(answer.clone()));
                Ok(answer)
            }
            Err(err) => {
                let err = rewrite_transcript_error(err);
                warn!(%video_id, error = %err, "video question failed");
                self.history
                    .lock()
                    .await
                    .push(ChatMessage::bot(format!("Error: {err}")));
                Err(err)
            }
        }
    }
}

fn rewrite_transcript_error(err: SessionError) -> SessionError {
    match err {
        SessionError::Backend { status, detail }
            if detail.to_ascii_lowercase().contains("transcript not available") =>
        {
            SessionError::backend(status, NO_TRANSCRIPT_MESSAGE)
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "tests/assistants_tests.rs"]
mod tests;
