//! Capabilities the host environment provides: page text and speech playback.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

/// Visible content of the page the user is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub title: Option<String>,
    pub text: String,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Full visible text of the active page.
    async fn visible_text(&self) -> anyhow::Result<PageSnapshot>;
    /// Text the user has selected on the active page.
    async fn selected_text(&self) -> anyhow::Result<String>;
}

pub trait SpeechEngine: Send + Sync {
    /// Starts speaking `text`, replacing any utterance in progress.
    fn speak(&self, text: &str);
    /// Halts playback immediately.
    fn stop(&self);
    fn is_speaking(&self) -> bool;
}

/// Speaks replies and remembers the last one for replay.
pub struct Narrator<E> {
    engine: E,
    last_text: Mutex<Option<String>>,
}

impl<E: SpeechEngine> Narrator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            last_text: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn speak(&self, text: &str) {
        self.engine.stop();
        *self.last_text() = Some(text.to_string());
        debug!(chars = text.chars().count(), "speaking reply");
        self.engine.speak(text);
    }

    /// Speaks the last reply again. Returns false when there is nothing to replay.
    pub fn replay(&self) -> bool {
        let Some(text) = self.last_text().clone() else {
            return false;
        };
        self.engine.stop();
        self.engine.speak(&text);
        true
    }

    pub fn stop(&self) {
        if self.engine.is_speaking() {
            self.engine.stop();
        }
    }

    fn last_text(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_text
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingEngine {
        log: Mutex<Vec<String>>,
        speaking: Mutex<bool>,
    }

    impl SpeechEngine for RecordingEngine {
        fn speak(&self, text: &str) {
            self.log.lock().expect("log").push(format!("speak:{text}"));
            *self.speaking.lock().expect("speaking") = true;
        }

        fn stop(&self) {
            self.log.lock().expect("log").push("stop".into());
            *self.speaking.lock().expect("speaking") = false;
        }

        fn is_speaking(&self) -> bool {
            *self.speaking.lock().expect("speaking")
        }
    }

    #[test]
    fn replay_repeats_last_reply() {
        let narrator = Narrator::new(RecordingEngine::default());
        assert!(!narrator.replay());

        narrator.speak("first");
        narrator.speak("second");
        assert!(narrator.replay());

        let log = narrator.engine().log.lock().expect("log").clone();
        assert_eq!(
            log,
            vec!["stop", "speak:first", "stop", "speak:second", "stop", "speak:second"]
        );
    }

    #[test]
    fn stop_only_interrupts_active_playback() {
        let narrator = Narrator::new(RecordingEngine::default());
        narrator.stop();
        assert!(narrator.engine().log.lock().expect("log").is_empty());

        narrator.speak("hello");
        narrator.stop();
        assert!(!narrator.engine().is_speaking());
    }
}
