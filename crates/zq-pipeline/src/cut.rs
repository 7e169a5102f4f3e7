//! `cut` — projects a record down to a named set of fields, or (with
//! `complement`) down to everything *except* that set. Complement is
//! computed over top-level column names only.

use crate::context::ProcContext;
use crate::error::{PipelineError, Result};
use crate::proc::Proc;
use zq_core::{record_of, Value};
use zq_expr::FieldPath;
use zq_stream::Batch;

pub struct Cut {
    upstream: Box<dyn Proc>,
    fields: Vec<FieldPath>,
    complement: bool,
    strict: bool,
    pctx: ProcContext,
}

impl Cut {
    pub fn new(
        upstream: Box<dyn Proc>,
        fields: Vec<FieldPath>,
        complement: bool,
        strict: bool,
        pctx: ProcContext,
    ) -> Self {
        Cut { upstream, fields, complement, strict, pctx }
    }

    fn project(&self, record: &Value) -> Result<Option<Value>> {
        let wanted: Vec<FieldPath> = if self.complement {
            let top_level = record.record_fields()?;
            let excluded: Vec<&str> = self.fields.iter().map(|f| f.leaf()).collect();
            top_level
                .into_iter()
                .filter(|(name, _)| !excluded.contains(&name.as_str()))
                .map(|(name, _)| FieldPath(vec![name]))
                .collect()
        } else {
            self.fields.clone()
        };

        let mut out = Vec::with_capacity(wanted.len());
        for path in &wanted {
            match path.get(record) {
                Some(v) => out.push((path.leaf().to_string(), v)),
                None if self.strict => {
                    return Err(PipelineError::Other(format!(
                        "cut: field {} not present",
                        path.dotted()
                    )))
                }
                None => continue,
            }
        }
        if out.is_empty() {
            return Ok(None);
        }
        let fields: Vec<(&str, Value)> = out.iter().map(|(n, v)| (n.as_str(), v.clone())).collect();
        Ok(Some(record_of(&self.pctx.types, fields)?))
    }
}

impl Proc for Cut {
    fn pull(&mut self) -> Result<Option<Batch>> {
        loop {
            if self.pctx.is_cancelled() {
                return Ok(None);
            }
            let Some(batch) = self.upstream.pull()? else {
                return Ok(None);
            };
            let span = batch.span();
            let mut out = Vec::with_capacity(batch.len());
            for rec in batch.into_records() {
                if let Some(projected) = self.project(&rec)? {
                    out.push(projected);
                }
            }
            if out.is_empty() {
                continue;
            }
            return Ok(Some(match span {
                Some(s) => Batch::with_span(out, s),
                None => Batch::new(out),
            }));
        }
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

    fn sample_record(ctx: &Context) -> Value {
        let i64t = ctx.primitive(Primitive::Int64);
        let strt = ctx.primitive(Primitive::String);
        let ty = ctx
            .lookup_type_record(vec![
                Column { name: "a".into(), ty: i64t.clone() },
                Column { name: "b".into(), ty: strt.clone() },
            ])
            .unwrap();
        Value::build_record(
            ty,
            &[
                Value::parse(&i64t, "1").unwrap(),
                Value::parse(&strt, "hi").unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn keeps_named_field() {
        let ctx = std::sync::Arc::new(Context::new());
        let rec = sample_record(&ctx);
        let upstream = Box::new(OneShot(Some(Batch::new(vec![rec]))));
        let pctx = ProcContext::new(ctx, CancellationToken::new());
        let mut cut = Cut::new(upstream, vec![FieldPath::parse("a")], false, true, pctx);
        let out = cut.pull().unwrap().unwrap();
        let fields = out.records()[0].record_fields().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0, "a");
    }

    #[test]
    fn complement_drops_named_field() {
        let ctx = std::sync::Arc::new(Context::new());
        let rec = sample_record(&ctx);
        let upstream = Box::new(OneShot(Some(Batch::new(vec![rec]))));
        let pctx = ProcContext::new(ctx, CancellationToken::new());
        let mut cut = Cut::new(upstream, vec![FieldPath::parse("a")], true, true, pctx);
        let out = cut.pull().unwrap().unwrap();
        let fields = out.records()[0].record_fields().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0, "b");
    }
}
