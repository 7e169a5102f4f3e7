//! # zq-pipeline — the operator DAG
//!
//! A `Proc` is a pull-based node in the record pipeline: `pull()` returns
//! the next [`zq_stream::Batch`] or `None` at end of stream, and `done()`
//! lets a downstream stop the DAG early. This module provides every
//! operator named in the pipeline spec: [`filter::Filter`], [`cut::Cut`],
//! [`put::Put`], [`rename::Rename`], [`head::Head`], [`tail::Tail`],
//! [`uniq::Uniq`], [`merge::Merge`], and [`pass::Pass`].

pub mod context;
pub mod cut;
pub mod error;
pub mod filter;
pub mod head;
pub mod merge;
pub mod pass;
pub mod proc;
pub mod put;
pub mod rename;
pub mod tail;
pub mod uniq;

pub use context::{ProcContext, Stats, StatsSink};
pub use cut::Cut;
pub use error::{PipelineError, Result};
pub use filter::Filter;
pub use head::Head;
pub use merge::Merge;
pub use pass::Pass;
pub use proc::Proc;
pub use put::Put;
pub use rename::Rename;
pub use tail::Tail;
pub use uniq::Uniq;
