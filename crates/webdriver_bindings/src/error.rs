use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum WebDriverError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("No such element: {0}")]
    NoSuchElement(String),
    #[error("No such alert: {0}")]
    NoSuchAlert(String),
    #[error("Timed out after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: String,
        timeout: Duration,
    },
    #[error("WebDriver error `{error}`: {message}")]
    Protocol { error: String, message: String },
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl WebDriverError {
    /// Maps a W3C error payload (`{"error": ..., "message": ...}`) onto a variant.
    pub(crate) fn from_payload(error: &str, message: &str) -> Self {
        match error {
            "no such element" | "stale element reference" => {
                WebDriverError::NoSuchElement(message.to_string())
            }
            "no such alert" => WebDriverError::NoSuchAlert(message.to_string()),
            _ => WebDriverError::Protocol {
                error: error.to_string(),
                message: message.to_string(),
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WebDriverError::Timeout { .. })
    }
}
