use crate::{auth::AuthError, capture::CaptureError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    ParseError(&'static str),
    #[error("Unknown subject: {0}")]
    UnknownSubject(String),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
