//! Console stand-ins for the browser: page text comes from files or stdin and
//! speech is paced word by word on stdout.

use std::{
    io::Write,
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use client_core::{PageSnapshot, PageSource, SpeechEngine};
use tokio::{io::AsyncReadExt, runtime::Handle, task::JoinHandle};
use tracing::{debug, warn};

/// Reads page content from a saved file, or stdin when no path is given.
pub struct FilePageSource {
    path: Option<PathBuf>,
    title: Option<String>,
}

impl FilePageSource {
    pub fn new(path: Option<PathBuf>, title: Option<String>) -> Self {
        Self { path, title }
    }

    async fn read_all(&self) -> anyhow::Result<String> {
        match &self.path {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read page text from '{}'", path.display())),
            None => {
                let mut text = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut text)
                    .await
                    .context("failed to read page text from stdin")?;
                Ok(text)
            }
        }
    }
}

#[async_trait]
impl PageSource for FilePageSource {
    async fn visible_text(&self) -> anyhow::Result<PageSnapshot> {
        let text = self.read_all().await?;
        let title = self.title.clone().or_else(|| {
            self.path
                .as_ref()
                .and_then(|path| path.file_stem())
                .map(|stem| stem.to_string_lossy().into_owned())
        });
        debug!(chars = text.chars().count(), ?title, "captured page text");
        Ok(PageSnapshot { title, text })
    }

    async fn selected_text(&self) -> anyhow::Result<String> {
        Ok(self.read_all().await?.trim().to_string())
    }
}

/// Prints words at a reading pace; stopping aborts the printing task.
pub struct ConsoleSpeech {
    word_delay: Duration,
    playback: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleSpeech {
    pub fn new(words_per_minute: u32) -> Self {
        let words_per_minute = u64::from(words_per_minute.max(1));
        Self {
            word_delay: Duration::from_millis(60_000 / words_per_minute),
            playback: Mutex::new(None),
        }
    }

    fn playback(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.playback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SpeechEngine for ConsoleSpeech {
    fn speak(&self, text: &str) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no runtime available for speech playback");
            return;
        };
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let word_delay = self.word_delay;
        let task = runtime.spawn(async move {
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, "(speaking)");
            for word in words {
                let _ = write!(stdout, " {word}");
                let _ = stdout.flush();
                tokio::time::sleep(word_delay).await;
            }
            let _ = writeln!(stdout);
        });
        if let Some(previous) = self.playback().replace(task) {
            previous.abort();
        }
    }

    fn stop(&self) {
        if let Some(task) = self.playback().take() {
            if !task.is_finished() {
                println!();
                debug!("speech stopped");
            }
            task.abort();
        }
    }

    fn is_speaking(&self) -> bool {
        self.playback()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
