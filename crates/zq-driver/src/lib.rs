//! # zq-driver — compiled AST, operator compiler, and driver loop
//!
//! The parser that produces a [`ast::CompiledOp`] tree from query text is
//! out of scope; this crate picks up from there. [`compile::compile`] turns
//! that tree into a live [`zq_pipeline::Proc`] DAG using the operators
//! `zq-pipeline`/`zq-outofcore` already implement, and [`run::run`] pumps
//! the resulting root to completion against a [`run::Driver`] sink.

pub mod ast;
pub mod compile;
pub mod error;
pub mod run;
pub mod source;

pub use ast::{AggSpec, CompiledOp, EveryDuration, ExprSpec, LiteralSpec, PredSpec, SortKeySpec};
pub use compile::{compile, CompileConfig};
pub use error::{DriverError, Result};
pub use run::{run, Driver, ROOT_CHANNEL};
pub use source::SourceProc;
