use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Pipeline(#[from] zq_pipeline::PipelineError),

    #[error(transparent)]
    OutOfCore(#[from] zq_outofcore::OutOfCoreError),

    #[error(transparent)]
    Expr(#[from] zq_expr::ExprError),

    #[error(transparent)]
    Type(#[from] zq_core::TypeError),

    #[error("unknown reducer kind: {0}")]
    UnknownReducer(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;

impl From<DriverError> for zq_pipeline::PipelineError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Pipeline(p) => p,
            other => zq_pipeline::PipelineError::Other(other.to_string()),
        }
    }
}
