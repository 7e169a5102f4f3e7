//! The per-query execution context threaded through every operator: the
//! type-interning `Context`, a shared warning sink, cancellation, and
//! running stats. Grounded on `rde_core::Operator`'s `CancellationToken`
//! usage, generalized from a per-operator handle to a per-query one since
//! `Pull`-based operators share no channel to carry it implicitly.

use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use zq_stream::Warner;

#[derive(Default, Debug, Clone, Copy)]
pub struct Stats {
    pub records_read: u64,
    pub records_written: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

pub trait StatsSink: Send {
    fn update(&mut self, delta: Stats);
}

impl StatsSink for Stats {
    fn update(&mut self, delta: Stats) {
        self.records_read += delta.records_read;
        self.records_written += delta.records_written;
        self.bytes_read += delta.bytes_read;
        self.bytes_written += delta.bytes_written;
    }
}

#[derive(Clone)]
pub struct ProcContext {
    pub types: Arc<zq_core::Context>,
    warner: Arc<Mutex<dyn Warner>>,
    stats: Arc<Mutex<dyn StatsSink>>,
    cancel: CancellationToken,
}

impl ProcContext {
    pub fn new(types: Arc<zq_core::Context>, cancel: CancellationToken) -> Self {
        ProcContext {
            types,
            warner: Arc::new(Mutex::new(zq_stream::CollectingWarner::default())),
            stats: Arc::new(Mutex::new(Stats::default())),
            cancel,
        }
    }

    pub fn with_sinks(
        types: Arc<zq_core::Context>,
        cancel: CancellationToken,
        warner: Arc<Mutex<dyn Warner>>,
        stats: Arc<Mutex<dyn StatsSink>>,
    ) -> Self {
        ProcContext { types, warner, stats, cancel }
    }

    pub fn warn(&self, msg: impl Into<String>) {
        if let Ok(mut w) = self.warner.lock() {
            w.warn(msg.into());
        }
    }

    pub fn record_stats(&self, delta: Stats) {
        if let Ok(mut s) = self.stats.lock() {
            s.update(delta);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn child(&self) -> Self {
        ProcContext {
            types: self.types.clone(),
            warner: self.warner.clone(),
            stats: self.stats.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_and_cancel_are_shared_across_clones() {
        let pctx = ProcContext::new(Arc::new(zq_core::Context::new()), CancellationToken::new());
        let child = pctx.child();
        pctx.warn("boom");
        child.cancel_token().cancel();
        assert!(pctx.is_cancelled());
    }
}
