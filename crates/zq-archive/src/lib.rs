//! # zq-archive — chunk overlap resolver and zdx index header
//!
//! A time-partitioned archive stores records across many immutable
//! `Chunk`s, each sorted internally but with spans that may overlap their
//! neighbors at the seams. [`merge_chunks_to_spans`] turns the raw chunk
//! set into an ordered, non-overlapping sequence of spans a reader can
//! drive one at a time, merging chunks only where their spans actually
//! overlap. [`index`] covers the header record every zdx index file opens
//! with.

pub mod chunk;
pub mod error;
pub mod index;
pub mod overlap;

pub use chunk::{Chunk, ChunkId};
pub use error::{ArchiveError, Result};
pub use overlap::{merge_chunks_to_spans, SpanInfo};
