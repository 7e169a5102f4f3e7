//! # zq-io — a minimal line-delimited-JSON source/sink
//!
//! The driver and pipeline crates work purely in terms of `zq_stream`'s
//! `Reader`/`Writer` traits; this crate is the thinnest concrete
//! implementation of them, reading and writing one JSON object per line
//! with no schema declared up front. It exists to give the CLI and the
//! integration tests a real file format to drive end to end — it is not
//! a stand-in for the columnar/binary/cloud formats those are out of
//! scope here.

pub mod error;
pub mod ndjson;

pub use error::{IoFormatError, Result};
pub use ndjson::{line_to_record, record_to_line, NdjsonReader, NdjsonWriter};
