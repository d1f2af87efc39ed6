use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failure, non-success status, or an error envelope.
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("invalid response shape: {0}")]
    InvalidResponseShape(String),
    #[error("unsupported file: {0}")]
    UnsupportedFile(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::RequestFailed(e.to_string())
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
