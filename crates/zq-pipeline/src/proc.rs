//! The pull-based operator contract. Unlike the teacher's push/channel
//! `Transform::run(rx, tx, cancel)` loop, operators here are driven by a
//! downstream puller calling `pull()` until it returns `Ok(None)`; this is
//! required to let `merge` and `pass` hold more than one upstream at once.
//! `Done` lets a downstream stop the DAG early (`head`) without draining
//! every upstream record.

use crate::error::Result;
use zq_stream::Batch;

pub trait Proc: Send {
    /// Pulls the next batch, or `Ok(None)` at end of stream. Once `None` is
    /// returned, every subsequent call must also return `None`.
    fn pull(&mut self) -> Result<Option<Batch>>;

    /// Tells every upstream operator to stop producing records as soon as
    /// possible; `pull()` may still be called afterward and must return
    /// cleanly (typically `Ok(None)`).
    fn done(&mut self);
}
