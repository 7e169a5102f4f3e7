//! Pumps a compiled operator tree to completion, forwarding batches,
//! warnings, and periodic stats to a [`Driver`] sink. There is exactly one
//! compiled root per query (the AST has no multi-sink fan-out), so every
//! batch is written to the same `channel_id`.

use std::sync::{Arc, Mutex};

use zq_pipeline::{ProcContext, Stats};
use zq_stream::{Batch, CollectingWarner};

use crate::error::Result;

pub const ROOT_CHANNEL: u32 = 0;

/// The sink a driver loop reports to — batches, warnings, per-channel EOS,
/// and periodic stats snapshots.
pub trait Driver: Send {
    fn write(&mut self, channel_id: u32, batch: Batch);
    fn warn(&mut self, msg: String);
    fn channel_end(&mut self, channel_id: u32);
    fn stats(&mut self, stats: Stats);
}

fn drain_warnings(warner: &Arc<Mutex<CollectingWarner>>, driver: &mut dyn Driver) {
    if let Ok(mut w) = warner.lock() {
        for msg in w.messages.drain(..) {
            driver.warn(msg);
        }
    }
}

/// Pulls `root` until it's exhausted or the context is cancelled, forwarding
/// every batch, warning, and stats delta to `driver`, then signals
/// `ROOT_CHANNEL`'s end.
pub fn run(
    root: &mut dyn zq_pipeline::Proc,
    driver: &mut dyn Driver,
    pctx: &ProcContext,
    warner: Arc<Mutex<CollectingWarner>>,
    stats: Arc<Mutex<Stats>>,
) -> Result<()> {
    loop {
        if pctx.is_cancelled() {
            root.done();
            drain_warnings(&warner, driver);
            break;
        }
        match root.pull()? {
            None => {
                drain_warnings(&warner, driver);
                break;
            }
            Some(batch) => {
                drain_warnings(&warner, driver);
                if let Ok(s) = stats.lock() {
                    driver.stats(*s);
                }
                driver.write(ROOT_CHANNEL, batch);
            }
        }
    }
    driver.channel_end(ROOT_CHANNEL);
    Ok(())
}
