//! Console rendering of UI events.

use client_core::{DeleteOutcome, Session};
use shared::{
    domain::{ChatMessage, ChatRole, RiskBand, Severity},
    protocol::RiskReport,
};

use tracing::debug;

use crate::events::UiEvent;

pub fn print_event(event: &UiEvent) {
    let lines = render_event(event);
    if let UiEvent::Error(error) = event {
        debug!(
            category = ?error.category(),
            context = ?error.context(),
            "command failed"
        );
        for line in lines {
            eprintln!("{line}");
        }
    } else {
        for line in lines {
            println!("{line}");
        }
    }
}

pub fn render_event(event: &UiEvent) -> Vec<String> {
    match event {
        UiEvent::Info(message) => vec![message.clone()],
        UiEvent::DocumentReady(document) => vec![
            format!("Loaded {} ({} chunks)", document.filename, document.num_chunks),
            document.announcement.clone(),
        ],
        UiEvent::AnalysisReady(report) => render_report(report),
        UiEvent::Answer(answer) => vec![format!("Bot: {answer}")],
        UiEvent::SessionShown(session) => render_session(session),
        UiEvent::Deleted(outcome) => vec![render_delete(outcome)],
        UiEvent::Documents(documents) if documents.is_empty() => {
            vec!["No documents on the server.".to_string()]
        }
        UiEvent::Documents(documents) => documents
            .iter()
            .map(|doc| {
                format!(
                    "{}  {} ({} chars, {} chunks)",
                    doc.document_id, doc.filename, doc.text_length, doc.num_chunks
                )
            })
            .collect(),
        UiEvent::Status(info) => vec![match &info.version {
            Some(version) => format!("Server is running: {} (v{version})", info.message),
            None => format!("Server is running: {}", info.message),
        }],
        UiEvent::VoiceReply(reply) => vec![format!("Reply: {reply}")],
        UiEvent::VideoAnswer { video_id, answer } => vec![format!("[{video_id}] Bot: {answer}")],
        UiEvent::Error(error) => {
            let mut lines = vec![format!("Error: {}", error.message())];
            if error.requires_resubmit() {
                lines.push("Upload the document again to continue.".to_string());
            }
            lines
        }
    }
}

pub fn band_label(band: RiskBand) -> &'static str {
    match band {
        RiskBand::High => "HIGH (red)",
        RiskBand::Medium => "MEDIUM (yellow)",
        RiskBand::Low => "LOW (green)",
    }
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "HIGH",
        Severity::Medium => "MEDIUM",
        Severity::Low => "LOW",
    }
}

fn render_report(report: &RiskReport) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Risk score: {}/100  {}  ({})",
            report.risk_score,
            band_label(report.band()),
            report.risk_level
        ),
        String::new(),
        report.detailed_analysis.clone(),
    ];
    if !report.key_risks.is_empty() {
        lines.push(String::new());
        lines.push("Key risks:".to_string());
        lines.extend(report.key_risks.iter().map(|risk| {
            format!(
                "  [{}] {}: {}",
                severity_tag(risk.severity),
                risk.title,
                risk.description
            )
        }));
    }
    lines
}

fn render_session(session: &Session) -> Vec<String> {
    let Some(document_id) = session.document_id() else {
        return vec!["No document loaded.".to_string()];
    };
    let mut lines = vec![format!(
        "Document: {} ({document_id})",
        session.filename().unwrap_or("untitled")
    )];
    match session.analysis() {
        Some(report) => lines.extend(render_report(report)),
        None => lines.push("No risk analysis yet.".to_string()),
    }
    if !session.chat_history().is_empty() {
        lines.push(String::new());
        lines.extend(session.chat_history().iter().map(render_chat_line));
    }
    lines
}

fn render_chat_line(message: &ChatMessage) -> String {
    let speaker = match message.role {
        ChatRole::User => "You",
        ChatRole::Bot => "Bot",
    };
    format!("{} {speaker}: {}", message.at.format("%H:%M"), message.text)
}

fn render_delete(outcome: &DeleteOutcome) -> String {
    match outcome {
        DeleteOutcome::Deleted(document_id) => format!("Deleted {document_id}."),
        DeleteOutcome::AlreadyGone(document_id) => {
            format!("Cleared {document_id}; the server had already removed it.")
        }
        DeleteOutcome::LocalOnly {
            document_id,
            reason,
        } => format!("Cleared {document_id} locally; the server was not updated ({reason})."),
        DeleteOutcome::NothingLoaded => "No document loaded.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use shared::{domain::DocumentId, protocol::KeyRisk};

    use super::*;
    use crate::events::{UiError, UiErrorContext};
    use client_core::SessionError;

    fn report(score: u8) -> RiskReport {
        RiskReport {
            risk_score: score,
            risk_level: "Medium".into(),
            detailed_analysis: "Some clauses need attention.".into(),
            key_risks: vec![KeyRisk {
                title: "Auto renewal".into(),
                description: "Renews yearly".into(),
                severity: Severity::Medium,
            }],
        }
    }

    #[test]
    fn band_follows_score_thresholds() {
        assert_eq!(band_label(report(71).band()), "HIGH (red)");
        assert_eq!(band_label(report(70).band()), "MEDIUM (yellow)");
        assert_eq!(band_label(report(40).band()), "LOW (green)");
    }

    #[test]
    fn report_lists_key_risks() {
        let lines = render_event(&UiEvent::AnalysisReady(report(55)));
        assert_eq!(lines[0], "Risk score: 55/100  MEDIUM (yellow)  (Medium)");
        assert!(lines.contains(&"  [MEDIUM] Auto renewal: Renews yearly".to_string()));
    }

    #[test]
    fn empty_session_says_so() {
        let lines = render_event(&UiEvent::SessionShown(Session::default()));
        assert_eq!(lines, vec!["No document loaded."]);
    }

    #[test]
    fn stale_error_asks_for_upload() {
        let error = UiError::from_session(
            UiErrorContext::Ask,
            &SessionError::StaleReference {
                document_id: DocumentId::from("lease_pdf"),
            },
        );
        let lines = render_event(&UiEvent::Error(error));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "Upload the document again to continue.");
    }
}
