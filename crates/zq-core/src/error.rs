use thiserror::Error;

/// Errors produced by the type system and value encoding layer.
#[derive(Debug, Error)]
pub enum TypeError {
    #[error("syntax error parsing type string: {0}")]
    Syntax(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("not a number")]
    NotNumber,

    #[error("not a container type")]
    NotContainer,

    #[error("not an array")]
    NotArray,

    #[error("index out of range")]
    Index,

    #[error("container length unset")]
    LenUnset,

    #[error("alias name {0:?} already bound to a different type")]
    AliasConflict(String),

    #[error("unknown primitive type {0:?}")]
    UnknownPrimitive(String),

    #[error("union tag {0} out of range")]
    BadUnionTag(u32),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TypeError>;
