//! `filter` — keeps records matching a boolean predicate.

use crate::context::ProcContext;
use crate::error::Result;
use crate::proc::Proc;
use zq_expr::Predicate;
use zq_stream::Batch;

pub struct Filter {
    upstream: Box<dyn Proc>,
    pred: Predicate,
    pctx: ProcContext,
}

impl Filter {
    pub fn new(upstream: Box<dyn Proc>, pred: Predicate, pctx: ProcContext) -> Self {
        Filter { upstream, pred, pctx }
    }
}

impl Proc for Filter {
    fn pull(&mut self) -> Result<Option<Batch>> {
        loop {
            if self.pctx.is_cancelled() {
                return Ok(None);
            }
            let Some(batch) = self.upstream.pull()? else {
                return Ok(None);
            };
            let span = batch.span();
            let kept: Vec<_> = batch.into_records().into_iter().filter(|r| (self.pred)(r)).collect();
            if kept.is_empty() {
                continue;
            }
            return Ok(Some(match span {
                Some(s) => Batch::with_span(kept, s),
                None => Batch::new(kept),
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
    use zq_core::{Context, Primitive, Value};

    struct OneShot(Option<Batch>);
    impl Proc for OneShot {
        fn pull(&mut self) -> Result<Option<Batch>> {
            Ok(self.0.take())
        }
        fn done(&mut self) {}
    }

    fn iv(ctx: &Context, v: i64) -> Value {
        let t = ctx.primitive(Primitive::Int64);
        Value::parse(&t, &v.to_string()).unwrap()
    }

    #[test]
    fn keeps_only_matching_records() {
        let ctx = std::sync::Arc::new(Context::new());
        let recs = vec![iv(&ctx, 1), iv(&ctx, 2), iv(&ctx, 3)];
        let upstream = Box::new(OneShot(Some(Batch::new(recs))));
        let pred: Predicate = zq_expr::comparison(zq_expr::Op::Gt, &zq_expr::Literal::Int(1)).unwrap();
        let pctx = ProcContext::new(ctx, CancellationToken::new());
        let mut f = Filter::new(upstream, pred, pctx);
        let out = f.pull().unwrap().unwrap();
        assert_eq!(out.len(), 2);
        assert!(f.pull().unwrap().is_none());
    }
}
