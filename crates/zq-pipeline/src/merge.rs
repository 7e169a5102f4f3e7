//! `merge` — joins several upstream branches into one stream, either by
//! simple interleaving (first-ready-wins) or, given a comparator, by an
//! ordered k-way merge built on [`zq_stream::Combiner`].
//!
//! This is one of only two operators (the other being the out-of-core
//! spill sort/group-by) that actually needs concurrency: every branch must
//! be pulled independently so a slow branch doesn't starve the others.
//! Branches run on `tokio::task::spawn_blocking`, the same
//! `CancellationToken`-cooperative idiom the teacher's `Source`/`Transform`
//! operators use, adapted from push-with-a-channel to pull-with-a-channel.

use crate::context::ProcContext;
use crate::error::{PipelineError, Result};
use crate::proc::Proc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;
use zq_core::Value;
use zq_stream::{Batch, Combiner, Reader, SortFn};

enum RecordMsg {
    Record(Value),
    Eos,
    Err(String),
}

enum BatchMsg {
    Batch(Batch),
    Eos,
    Err(String),
}

/// Adapts a bounded channel of per-branch records into a `zq_stream::Reader`
/// so the ordered merge path can drive it through `Combiner`.
struct ChannelReader {
    rx: std_mpsc::Receiver<RecordMsg>,
    done: bool,
}

impl Reader for ChannelReader {
    fn read(&mut self) -> zq_stream::Result<Option<Value>> {
        if self.done {
            return Ok(None);
        }
        match self.rx.recv() {
            Ok(RecordMsg::Record(v)) => Ok(Some(v)),
            Ok(RecordMsg::Eos) | Err(_) => {
                self.done = true;
                Ok(None)
            }
            Ok(RecordMsg::Err(msg)) => {
                self.done = true;
                Err(zq_stream::StreamError::Other(msg))
            }
        }
    }
}

enum Merged {
    Unordered { rx: std_mpsc::Receiver<BatchMsg>, branches_live: usize },
    Ordered { combiner: Combiner },
}

pub struct Merge {
    state: Merged,
    stop: Arc<AtomicBool>,
}

impl Merge {
    /// Spawns every branch and returns a `Merge` ready to pull. `sort_fn` of
    /// `None` gives an unordered (first-ready) interleave.
    pub fn spawn(branches: Vec<Box<dyn Proc>>, sort_fn: Option<SortFn>, pctx: ProcContext) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::runtime::Handle::current();

        let state = match sort_fn {
            None => {
                let (tx, rx) = std_mpsc::channel::<BatchMsg>();
                let live = branches.len();
                for mut branch in branches {
                    let tx = tx.clone();
                    let stop = stop.clone();
                    let pctx = pctx.child();
                    handle.spawn_blocking(move || {
                        loop {
                            if stop.load(AtomicOrdering::Relaxed) || pctx.is_cancelled() {
                                branch.done();
                                break;
                            }
                            match branch.pull() {
                                Ok(Some(b)) => {
                                    if tx.send(BatchMsg::Batch(b)).is_err() {
                                        break;
                                    }
                                }
                                Ok(None) => {
                                    let _ = tx.send(BatchMsg::Eos);
                                    break;
                                }
                                Err(e) => {
                                    let _ = tx.send(BatchMsg::Err(e.to_string()));
                                    break;
                                }
                            }
                        }
                    });
                }
                Merged::Unordered { rx, branches_live: live }
            }
            Some(sort_fn) => {
                let mut readers: Vec<Box<dyn Reader>> = Vec::with_capacity(branches.len());
                for mut branch in branches {
                    let (tx, rx) = std_mpsc::sync_channel::<RecordMsg>(64);
                    let stop = stop.clone();
                    let pctx = pctx.child();
                    handle.spawn_blocking(move || loop {
                        if stop.load(AtomicOrdering::Relaxed) || pctx.is_cancelled() {
                            branch.done();
                            break;
                        }
                        match branch.pull() {
                            Ok(Some(b)) => {
                                for rec in b.into_records() {
                                    if tx.send(RecordMsg::Record(rec)).is_err() {
                                        return;
                                    }
                                }
                            }
                            Ok(None) => {
                                let _ = tx.send(RecordMsg::Eos);
                                break;
                            }
                            Err(e) => {
                                let _ = tx.send(RecordMsg::Err(e.to_string()));
                                break;
                            }
                        }
                    });
                    readers.push(Box::new(ChannelReader { rx, done: false }));
                }
                Merged::Ordered { combiner: Combiner::new(readers, sort_fn) }
            }
        };
        Merge { state, stop }
    }
}

const ORDERED_BATCH_SIZE: usize = 256;

impl Proc for Merge {
    fn pull(&mut self) -> Result<Option<Batch>> {
        match &mut self.state {
            Merged::Unordered { rx, branches_live } => loop {
                if *branches_live == 0 {
                    return Ok(None);
                }
                match rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(BatchMsg::Batch(b)) => return Ok(Some(b)),
                    Ok(BatchMsg::Eos) => {
                        *branches_live -= 1;
                        continue;
                    }
                    Ok(BatchMsg::Err(msg)) => return Err(PipelineError::Other(msg)),
                    Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => return Ok(None),
                }
            },
            Merged::Ordered { combiner } => {
                let mut out = Vec::with_capacity(ORDERED_BATCH_SIZE);
                while out.len() < ORDERED_BATCH_SIZE {
                    match combiner.read() {
                        Ok(Some(v)) => out.push(v),
                        Ok(None) => break,
                        Err(e) => return Err(PipelineError::Stream(e)),
                    }
                }
                if out.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Batch::new(out)))
                }
            }
        }
    }

    fn done(&mut self) {
        self.stop.store(true, AtomicOrdering::Relaxed);
    }
}

impl Drop for Merge {
    fn drop(&mut self) {
        self.stop.store(true, AtomicOrdering::Relaxed);
    }
}
