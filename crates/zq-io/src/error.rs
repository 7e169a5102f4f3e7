use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoFormatError {
    #[error(transparent)]
    Type(#[from] zq_core::TypeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("unsupported JSON value (nested arrays/objects) in stub reader: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, IoFormatError>;

impl From<IoFormatError> for zq_stream::StreamError {
    fn from(e: IoFormatError) -> Self {
        match e {
            IoFormatError::Type(t) => zq_stream::StreamError::Type(t),
            IoFormatError::Io(io) => zq_stream::StreamError::Io(io),
            other => zq_stream::StreamError::Other(other.to_string()),
        }
    }
}
