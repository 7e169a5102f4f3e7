//! `put` — adds or overwrites named fields with the result of an
//! expression, evaluated per record.

use crate::context::ProcContext;
use crate::error::Result;
use crate::proc::Proc;
use zq_core::{record_of, Value};
use zq_expr::Expr;
use zq_stream::Batch;

pub struct Put {
    upstream: Box<dyn Proc>,
    assignments: Vec<(String, Expr)>,
    pctx: ProcContext,
}

impl Put {
    pub fn new(upstream: Box<dyn Proc>, assignments: Vec<(String, Expr)>, pctx: ProcContext) -> Self {
        Put { upstream, assignments, pctx }
    }

    fn apply(&self, record: &Value) -> Result<Value> {
        let mut fields = record.record_fields()?;
        for (name, expr) in &self.assignments {
            let v = expr.eval(&self.pctx.types, record);
            if let Some(slot) = fields.iter_mut().find(|(n, _)| n == name) {
                slot.1 = v;
            } else {
                fields.push((name.clone(), v));
            }
        }
        let refs: Vec<(&str, Value)> = fields.iter().map(|(n, v)| (n.as_str(), v.clone())).collect();
        Ok(record_of(&self.pctx.types, refs)?)
    }
}

impl Proc for Put {
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
    use zq_expr::FieldPath;

    struct OneShot(Option<Batch>);
    impl Proc for OneShot {
        fn pull(&mut self) -> Result<Option<Batch>> {
            Ok(self.0.take())
        }
        fn done(&mut self) {}
    }

    #[test]
    fn adds_computed_column() {
        let ctx = std::sync::Arc::new(Context::new());
        let i64t = ctx.primitive(Primitive::Int64);
        let ty = ctx
            .lookup_type_record(vec![Column { name: "a".into(), ty: i64t.clone() }])
            .unwrap();
        let rec = Value::build_record(ty, &[Value::parse(&i64t, "1").unwrap()]).unwrap();
        let upstream = Box::new(OneShot(Some(Batch::new(vec![rec]))));
        let pctx = ProcContext::new(ctx, CancellationToken::new());
        let assignments = vec![("b".to_string(), Expr::Field(FieldPath::parse("a")))];
        let mut put = Put::new(upstream, assignments, pctx);
        let out = put.pull().unwrap().unwrap();
        let fields = out.records()[0].record_fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].0, "b");
    }
}
