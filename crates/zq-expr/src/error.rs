use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error(transparent)]
    Type(#[from] zq_core::TypeError),

    #[error("unknown comparator: {0}")]
    UnknownComparator(String),

    #[error("bad regexp: {0}")]
    Regexp(#[from] regex::Error),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{0}() expects {1} argument(s), got {2}")]
    Arity(String, usize, usize),

    #[error("{0}() cannot be applied to argument of this type")]
    BadArgument(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ExprError>;
