//! `rename` — renames top-level fields. If a rename's target name already
//! exists on the record, the rename is skipped and a warning is raised
//! rather than silently overwriting the existing field (resolves the
//! rename/computed-key naming conflict open question: warn and keep the
//! existing field).

use crate::context::ProcContext;
use crate::error::Result;
use crate::proc::Proc;
use zq_core::{record_of, Value};
use zq_stream::Batch;

pub struct Rename {
    upstream: Box<dyn Proc>,
    renames: Vec<(String, String)>,
    pctx: ProcContext,
}

impl Rename {
    pub fn new(upstream: Box<dyn Proc>, renames: Vec<(String, String)>, pctx: ProcContext) -> Self {
        Rename { upstream, renames, pctx }
    }

    fn apply(&self, record: &Value) -> Result<Value> {
        let fields = record.record_fields()?;
        let names: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
        let mut out_names: Vec<String> = fields.iter().map(|(n, _)| n.clone()).collect();
        for (from, to) in &self.renames {
            let Some(idx) = names.iter().position(|n| n == from) else { continue };
            if names.iter().any(|n| n == to) || out_names.iter().any(|n| n == to) {
                self.pctx.warn(format!(
                    "rename: target field \"{to}\" already exists, keeping \"{from}\""
                ));
                continue;
            }
            out_names[idx] = to.clone();
        }
        let refs: Vec<(&str, Value)> = out_names
            .iter()
            .zip(fields.iter())
            .map(|(name, (_, v))| (name.as_str(), v.clone()))
            .collect();
        Ok(record_of(&self.pctx.types, refs)?)
    }
}

impl Proc for Rename {
    fn pull(&mut self) -> Result<Option<Batch>> {
        if self.pctx.is_cancelled() {
            return Ok(None);
        }
        let Some(batch) = self.upstream.pull()? else {
            return Ok(None);
        };
        let span = batch.span();
        let mut out = Vec::with_capacity(batch.len());
        for rec in batch.into_records() {
            out.push(self.apply(&rec)?);
        }
        Ok(Some(match span {
            Some(s) => Batch::with_span(out, s),
            None => Batch::new(out),
        }))
    }

    fn done(&mut self) {
        self.upstream.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use zq_core::{Column, Context, Primitive};

    struct OneShot(Option<Batch>);
    impl Proc for OneShot {
        fn pull(&mut self) -> Result<Option<Batch>> {
            Ok(self.0.take())
        }
        fn done(&mut self) {}
    }

    fn rec(ctx: &Context) -> Value {
        let i64t = ctx.primitive(Primitive::Int64);
        let ty = ctx
            .lookup_type_record(vec![
                Column { name: "a".into(), ty: i64t.clone() },
                Column { name: "b".into(), ty: i64t.clone() },
            ])
            .unwrap();
        Value::build_record(
            ty,
            &[Value::parse(&i64t, "1").unwrap(), Value::parse(&i64t, "2").unwrap()],
        )
        .unwrap()
    }

    #[test]
    fn renames_field() {
        let ctx = std::sync::Arc::new(Context::new());
        let upstream = Box::new(OneShot(Some(Batch::new(vec![rec(&ctx)]))));
        let pctx = ProcContext::new(ctx, CancellationToken::new());
        let mut r = Rename::new(upstream, vec![("a".to_string(), "z".to_string())], pctx);
        let out = r.pull().unwrap().unwrap();
        let fields = out.records()[0].record_fields().unwrap();
        assert_eq!(fields[0].0, "z");
    }

    #[test]
    fn conflicting_rename_keeps_existing_and_warns() {
        let ctx = std::sync::Arc::new(Context::new());
        let upstream = Box::new(OneShot(Some(Batch::new(vec![rec(&ctx)]))));
        let pctx = ProcContext::new(ctx, CancellationToken::new());
        let mut r = Rename::new(upstream, vec![("a".to_string(), "b".to_string())], pctx);
        let out = r.pull().unwrap().unwrap();
        let fields = out.records()[0].record_fields().unwrap();
        assert_eq!(fields[0].0, "a");
        assert_eq!(fields[1].0, "b");
    }
}
