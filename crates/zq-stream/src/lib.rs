//! # zq-stream — stream interfaces and combinators
//!
//! Built on [`zq_core`]'s typed values, this crate defines the `Reader`/
//! `Writer` contract every source, sink, and pipeline operator speaks, plus
//! the stream combinators used to compose them: [`batch::Batch`] (the unit
//! pipeline operators exchange), [`combiner::Combiner`] (ordered k-way
//! merge), [`peeker::Peeker`] (one-record lookahead), and
//! [`warning::WarningReader`] (recoverable-error-to-warning conversion).

pub mod batch;
pub mod combiner;
pub mod error;
pub mod peeker;
pub mod rw;
pub mod warning;

pub use batch::Batch;
pub use combiner::{Combiner, SortFn};
pub use error::{Result, StreamError};
pub use peeker::Peeker;
pub use rw::{Closer, Direction, MultiReader, MultiWriter, NamedReader, ReadCloser, Reader, Writer, WriteFlusher};
pub use warning::{CollectingWarner, Warner, WarningReader};
