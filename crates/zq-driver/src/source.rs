//! Adapts an external [`zq_stream::Reader`] into the pull-based [`Proc`]
//! contract — the compiled tree's only true leaf outside of a `Parallel`
//! branch.

use zq_pipeline::{Proc, ProcContext, Stats};
use zq_stream::Batch;

const SOURCE_BATCH_SIZE: usize = 256;

pub struct SourceProc {
    reader: Box<dyn zq_stream::Reader>,
    pctx: ProcContext,
    done: bool,
}

impl SourceProc {
    pub fn new(reader: Box<dyn zq_stream::Reader>, pctx: ProcContext) -> Self {
        SourceProc { reader, pctx, done: false }
    }
}

impl Proc for SourceProc {
    fn pull(&mut self) -> zq_pipeline::Result<Option<Batch>> {
        if self.done || self.pctx.is_cancelled() {
            return Ok(None);
        }
        let mut out = Vec::with_capacity(SOURCE_BATCH_SIZE);
        let mut bytes = 0usize;
        while out.len() < SOURCE_BATCH_SIZE {
            match self.reader.read() {
                Ok(Some(rec)) => {
                    bytes += rec.bytes_or_empty().len();
                    out.push(rec);
                }
                Ok(None) => {
                    self.done = true;
                    break;
                }
                Err(e) => return Err(zq_pipeline::PipelineError::Stream(e)),
            }
            if self.pctx.is_cancelled() {
                break;
            }
        }
        if out.is_empty() {
            return Ok(None);
        }
        self.pctx.record_stats(Stats { records_read: out.len() as u64, bytes_read: bytes as u64, ..Default::default() });
        Ok(Some(Batch::new(out)))
    }

    fn done(&mut self) {
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use zq_core::{Context, Primitive, Value};

    struct VecReader(std::vec::IntoIter<Value>);
    impl zq_stream::Reader for VecReader {
        fn read(&mut self) -> zq_stream::Result<Option<Value>> {
            Ok(self.0.next())
        }
    }

    #[test]
    fn reads_until_upstream_is_exhausted() {
        let ctx = Arc::new(Context::new());
        let t = ctx.primitive(Primitive::Int64);
        let vals = vec!["1", "2", "3"].into_iter().map(|s| Value::parse(&t, s).unwrap()).collect::<Vec<_>>();
        let pctx = ProcContext::new(ctx, CancellationToken::new());
        let mut src = SourceProc::new(Box::new(VecReader(vals.into_iter())), pctx);
        let batch = src.pull().unwrap().unwrap();
        assert_eq!(batch.len(), 3);
        assert!(src.pull().unwrap().is_none());
    }
}
