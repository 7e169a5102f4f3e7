//! Wraps a reader so that recoverable per-record errors are surfaced as
//! warnings on a sink rather than aborting the stream. Grounded on
//! `original_source/zbuf/warning.go`.

use crate::error::{Result, StreamError};
use crate::rw::Reader;
use zq_core::Value;

/// Sink for non-fatal diagnostics raised while pulling a stream. The
/// pipeline's `ProcContext` implements this to collect per-query warnings
/// (spec §5).
pub trait Warner: Send {
    fn warn(&mut self, msg: String);
}

/// A `Warner` that just accumulates messages, useful for tests and for the
/// driver's final warning list.
#[derive(Default)]
pub struct CollectingWarner {
    pub messages: Vec<String>,
}

impl Warner for CollectingWarner {
    fn warn(&mut self, msg: String) {
        self.messages.push(msg);
    }
}

pub struct WarningReader<R, W> {
    reader: R,
    warner: W,
}

impl<R: Reader, W: Warner> WarningReader<R, W> {
    pub fn new(reader: R, warner: W) -> Self {
        WarningReader { reader, warner }
    }

    pub fn into_warner(self) -> W {
        self.warner
    }
}

impl<R: Reader, W: Warner> Reader for WarningReader<R, W> {
    /// `StreamError::Other` records are treated as recoverable: the message
    /// is forwarded to the warner and the next record is pulled in its
    /// place. `Io`/`Type` errors remain fatal and propagate unchanged.
    fn read(&mut self) -> Result<Option<Value>> {
        loop {
            match self.reader.read() {
                Ok(v) => return Ok(v),
                Err(StreamError::Other(msg)) => {
                    self.warner.warn(msg);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
