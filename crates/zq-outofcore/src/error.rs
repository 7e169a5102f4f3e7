use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutOfCoreError {
    #[error(transparent)]
    Stream(#[from] zq_stream::StreamError),

    #[error(transparent)]
    Pipeline(#[from] zq_pipeline::PipelineError),

    #[error(transparent)]
    Type(#[from] zq_core::TypeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, OutOfCoreError>;
