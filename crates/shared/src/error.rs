use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body the backend attaches to every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// User-visible text for the detail: strings verbatim, structured
    /// details (validation lists) as compact JSON.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Extracts the detail message from a raw error response body.
pub fn detail_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body).ok()?.message()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_detail_is_verbatim() {
        assert_eq!(
            detail_from_body(r#"{"detail":"Only PDF and TXT files are supported"}"#).as_deref(),
            Some("Only PDF and TXT files are supported")
        );
    }

    #[test]
    fn structured_detail_falls_back_to_json_text() {
        let message = detail_from_body(r#"{"detail":[{"loc":["body","text"],"msg":"field required"}]}"#)
            .expect("detail");
        assert!(message.contains("field required"));
    }

    #[test]
    fn missing_or_non_json_detail_is_none() {
        assert_eq!(detail_from_body(r#"{"message":"nope"}"#), None);
        assert_eq!(detail_from_body("Internal Server Error"), None);
        assert_eq!(detail_from_body(r#"{"detail":""}"#), None);
    }
}
