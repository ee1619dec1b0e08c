use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{DocumentId, RiskBand, Severity, VideoId};

/// Question the analyzer backend expects when a full risk report is requested.
pub const START_ANALYSIS_QUESTION: &str = "start_analysis";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: DocumentId,
    pub filename: String,
    #[serde(default)]
    pub num_chunks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_length: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTextRequest {
    pub text: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentQuery {
    pub document_id: DocumentId,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRisk {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskReport {
    #[serde(deserialize_with = "deserialize_score")]
    pub risk_score: u8,
    pub risk_level: String,
    pub detailed_analysis: String,
    #[serde(default)]
    pub key_risks: Vec<KeyRisk>,
}

impl RiskReport {
    pub fn band(&self) -> RiskBand {
        RiskBand::from_score(self.risk_score)
    }
}

// Model output is not always an integer, and not always in range.
fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Err(serde::de::Error::custom("risk_score must be a finite number"));
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: DocumentId,
    pub filename: String,
    #[serde(default)]
    pub text_length: u64,
    #[serde(default)]
    pub num_chunks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceReply {
    #[serde(default)]
    pub reply: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoQuery {
    pub video_id: VideoId,
    pub question: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_report_normalizes_score_and_severity() {
        let report: RiskReport = serde_json::from_str(
            r#"{
                "risk_score": 84.6,
                "risk_level": "High",
                "detailed_analysis": "One-sided termination.",
                "key_risks": [
                    {"title": "Termination", "description": "At will", "severity": "HIGH"},
                    {"title": "Jurisdiction", "description": "Foreign venue", "severity": "medium"}
                ]
            }"#,
        )
        .expect("decode");

        assert_eq!(report.risk_score, 85);
        assert_eq!(report.band(), RiskBand::High);
        assert_eq!(report.key_risks[0].severity, Severity::High);
        assert_eq!(report.key_risks[1].severity, Severity::Medium);
    }

    #[test]
    fn out_of_range_score_is_clamped() {
        let report: RiskReport = serde_json::from_str(
            r#"{"risk_score": 140, "risk_level": "Critical", "detailed_analysis": ""}"#,
        )
        .expect("decode");
        assert_eq!(report.risk_score, 100);
        assert!(report.key_risks.is_empty());
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let err = serde_json::from_str::<KeyRisk>(
            r#"{"title": "x", "description": "y", "severity": "catastrophic"}"#,
        )
        .expect_err("unknown severity");
        assert!(err.to_string().contains("catastrophic"));
    }
}
