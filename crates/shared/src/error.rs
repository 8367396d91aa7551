use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message shown when a failed fetch carries nothing readable.
pub const GENERIC_FETCH_ERROR: &str = "Erro ao buscar dados.";

/// Error payload produced by the fleet backend. Controllers answer either
/// with a bare string or with the framework's JSON error object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Pulls the human-readable message out of an error response body.
///
/// Preference order: JSON `message`, a JSON string, the raw text. Blank
/// candidates are skipped and `None` means the body had nothing to offer.
pub fn extract_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(object @ Value::Object(_)) => serde_json::from_value::<ApiErrorBody>(object)
            .ok()?
            .message
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty()),
        Ok(Value::String(text)) => Some(text).filter(|text| !text.trim().is_empty()),
        Ok(_) => None,
        Err(_) => Some(body.to_string()),
    }
}
