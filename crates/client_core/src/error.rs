use shared::error::GENERIC_FETCH_ERROR;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectionError {
    /// Network unreachable, timeout, connection reset.
    #[error("{0}")]
    Transport(String),
    /// Backend answered with a non-2xx status.
    #[error("request failed with status {status}")]
    Status {
        status: u16,
        message: Option<String>,
    },
    #[error("failed to decode backend response: {0}")]
    Decode(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl CollectionError {
    /// Text stored in the collection state when a fetch fails.
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Transport(message) => message.trim().to_string(),
            Self::Status {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Status {
                status,
                message: None,
            } => format!("Request failed with status code {status}"),
            Self::Decode(_) | Self::Config(_) => self.to_string(),
        };

        if message.is_empty() {
            GENERIC_FETCH_ERROR.to_string()
        } else {
            message
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CollectionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
                message: None,
            };
        }
        if err.is_timeout() {
            return Self::Transport(format!("timeout of request exceeded: {err}"));
        }
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for CollectionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
