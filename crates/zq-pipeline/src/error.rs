use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stream(#[from] zq_stream::StreamError),

    #[error(transparent)]
    Expr(#[from] zq_expr::ExprError),

    #[error(transparent)]
    Type(#[from] zq_core::TypeError),

    #[error("query cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
