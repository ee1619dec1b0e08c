//! Commands the popup understands, shared by the CLI and the interactive shell.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum PopupCommand {
    /// Upload a PDF or TXT agreement.
    Upload { path: PathBuf },
    /// Submit pasted agreement text; reads stdin when no text is given.
    Paste {
        #[arg(long)]
        filename: Option<String>,
        text: Vec<String>,
    },
    /// Submit the visible text of a page saved to a file (or piped on stdin).
    Tab {
        #[arg(long)]
        title: Option<String>,
        path: Option<PathBuf>,
    },
    /// Run the risk analysis for the loaded document.
    Analyze,
    /// Ask a question about the loaded document.
    Ask {
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// Forget the loaded document here and on the server.
    Delete,
    /// Show the loaded document, cached analysis and chat.
    Show,
    /// List documents the server knows about.
    Documents,
    /// Check that the analyzer server is up.
    Status,
    /// Get a spoken reply for selected text; reads the selection from a file
    /// or stdin when no text is given.
    Voice {
        #[arg(long)]
        from: Option<PathBuf>,
        text: Vec<String>,
    },
    /// Speak the last voice reply again.
    Replay,
    /// Stop speaking.
    Stop,
    /// Ask a question about a video's transcript.
    Video {
        video_id: String,
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },
}

impl PopupCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::Paste { .. } => "paste",
            Self::Tab { .. } => "tab",
            Self::Analyze => "analyze",
            Self::Ask { .. } => "ask",
            Self::Delete => "delete",
            Self::Show => "show",
            Self::Documents => "documents",
            Self::Status => "status",
            Self::Voice { .. } => "voice",
            Self::Replay => "replay",
            Self::Stop => "stop",
            Self::Video { .. } => "video",
        }
    }

    /// True when the command would read its input from stdin.
    pub fn reads_stdin(&self) -> bool {
        match self {
            Self::Paste { text, .. } => text.is_empty(),
            Self::Tab { path, .. } => path.is_none(),
            Self::Voice { from, text } => from.is_none() && text.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ShellCommand {
    #[command(flatten)]
    Popup(PopupCommand),
    /// Leave the shell.
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

/// Parses one shell line. `Ok(None)` for a blank line; `Err` carries clap's
/// rendered usage message.
pub fn parse_shell_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    ShellLine::try_parse_from(words)
        .map(|parsed| Some(parsed.command))
        .map_err(|err| err.render().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_word_question() {
        let parsed = parse_shell_line("ask what is the notice period?").expect("parse");
        assert_eq!(
            parsed,
            Some(ShellCommand::Popup(PopupCommand::Ask {
                question: vec![
                    "what".into(),
                    "is".into(),
                    "the".into(),
                    "notice".into(),
                    "period?".into()
                ],
            }))
        );
    }

    #[test]
    fn blank_line_is_not_a_command() {
        assert_eq!(parse_shell_line("   "), Ok(None));
    }

    #[test]
    fn exit_is_an_alias_for_quit() {
        assert_eq!(parse_shell_line("exit"), Ok(Some(ShellCommand::Quit)));
    }

    #[test]
    fn unknown_command_reports_usage() {
        let err = parse_shell_line("summarize").expect_err("unknown");
        assert!(err.contains("summarize"));
    }

    #[test]
    fn stdin_readers_are_flagged() {
        assert!(PopupCommand::Paste {
            filename: None,
            text: vec![]
        }
        .reads_stdin());
        assert!(!PopupCommand::Tab {
            title: None,
            path: Some("page.txt".into())
        }
        .reads_stdin());
        assert!(!PopupCommand::Analyze.reads_stdin());
    }
}
