use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Type(#[from] zq_core::TypeError),

    #[error("not a zdx index")]
    NotAnIndex,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
