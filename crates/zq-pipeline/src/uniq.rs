//! `uniq` — collapses runs of consecutive, identical records, optionally
//! emitting a `count` field with the run length.

use crate::context::ProcContext;
use crate::error::Result;
use crate::proc::Proc;
use zq_core::{record_of, Value};
use zq_stream::Batch;

pub struct Uniq {
    upstream: Box<dyn Proc>,
    with_count: bool,
    pending: Option<(Value, u64)>,
    upstream_done: bool,
    pctx: ProcContext,
}

impl Uniq {
    pub fn new(upstream: Box<dyn Proc>, with_count: bool, pctx: ProcContext) -> Self {
        Uniq { upstream, with_count, pending: None, upstream_done: false, pctx }
    }

    fn same(a: &Value, b: &Value) -> bool {
        a.bytes_or_empty() == b.bytes_or_empty() && a.ty.as_ref().map(|t| t.id()) == b.ty.as_ref().map(|t| t.id())
    }

    fn finish_group(&self, rec: Value, count: u64) -> Result<Value> {
        if !self.with_count {
            return Ok(rec);
        }
        let mut fields = rec.record_fields()?;
        fields.retain(|(n, _)| n != "count");
        let t = self.pctx.types.primitive(zq_core::Primitive::Uint64);
        fields.push(("count".to_string(), Value::new(t, Some(zq_core::primitive::encode_uint(count)))));
        let refs: Vec<(&str, Value)> = fields.iter().map(|(n, v)| (n.as_str(), v.clone())).collect();
        Ok(record_of(&self.pctx.types, refs)?)
    }
}

impl Proc for Uniq {
    fn pull(&mut self) -> Result<Option<Batch>> {
        loop {
            if self.pctx.is_cancelled() {
                return Ok(None);
            }
            if self.upstream_done {
                return match self.pending.take() {
                    Some((rec, count)) => Ok(Some(Batch::new(vec![self.finish_group(rec, count)?]))),
                    None => Ok(None),
                };
            }
            let Some(batch) = self.upstream.pull()? else {
                self.upstream_done = true;
                continue;
            };
            let mut emitted = Vec::new();
            for rec in batch.into_records() {
                match self.pending.take() {
                    None => self.pending = Some((rec, 1)),
                    Some((cur, count)) => {
                        if Self::same(&cur, &rec) {
                            self.pending = Some((cur, count + 1));
                        } else {
                            emitted.push(self.finish_group(cur, count)?);
                            self.pending = Some((rec, 1));
                        }
                    }
                }
            }
            if !emitted.is_empty() {
                return Ok(Some(Batch::new(emitted)));
            }
        }
    }

    fn done(&mut self) {
        self.upstream_done = true;
        self.upstream.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use zq_core::{Context, Primitive};

    struct VecProc(std::vec::IntoIter<Value>);
    impl Proc for VecProc {
        fn pull(&mut self) -> Result<Option<Batch>> {
            match self.0.next() {
                Some(v) => Ok(Some(Batch::new(vec![v]))),
                None => Ok(None),
            }
        }
        fn done(&mut self) {}
    }

    #[test]
    fn collapses_consecutive_duplicates() {
        let ctx = std::sync::Arc::new(Context::new());
        let t = ctx.primitive(Primitive::Int64);
        let vals = vec!["1", "1", "2", "2", "2", "1"]
            .into_iter()
            .map(|s| Value::parse(&t, s).unwrap())
            .collect::<Vec<_>>();
        let upstream = Box::new(VecProc(vals.into_iter()));
        let pctx = ProcContext::new(ctx, CancellationToken::new());
        let mut u = Uniq::new(upstream, true, pctx);
        let mut counts = Vec::new();
        while let Some(b) = u.pull().unwrap() {
            for rec in b.records() {
                let c = rec.field_by_path(&["count"]).unwrap();
                counts.push(zq_core::primitive::decode_uint(c.bytes_or_empty()).unwrap());
            }
        }
        assert_eq!(counts, vec![2, 3, 1]);
    }
}
