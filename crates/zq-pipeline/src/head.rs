//! `head` — passes through at most the first N records, then stops
//! pulling upstream as early as possible.

use crate::error::Result;
use crate::proc::Proc;
use zq_stream::Batch;

pub struct Head {
    upstream: Box<dyn Proc>,
    remaining: usize,
    finished: bool,
}

impl Head {
    pub fn new(upstream: Box<dyn Proc>, limit: usize) -> Self {
        Head { upstream, remaining: limit, finished: limit == 0 }
    }
}

impl Proc for Head {
    fn pull(&mut self) -> Result<Option<Batch>> {
        if self.finished {
            return Ok(None);
        }
        let Some(batch) = self.upstream.pull()? else {
            self.finished = true;
            return Ok(None);
        };
        let span = batch.span();
        let mut records = batch.into_records();
        if records.len() >= self.remaining {
            records.truncate(self.remaining);
            self.remaining = 0;
            self.finished = true;
            self.upstream.done();
        } else {
            self.remaining -= records.len();
        }
        Ok(Some(match span {
            Some(s) => Batch::with_span(records, s),
            None => Batch::new(records),
        }))
    }

    fn done(&mut self) {
        self.finished = true;
        self.upstream.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::{Context, Primitive, Value};

    struct Infinite(i64);
    impl Proc for Infinite {
        fn pull(&mut self) -> Result<Option<Batch>> {
            let ctx = Context::new();
            let t = ctx.primitive(Primitive::Int64);
            self.0 += 1;
            Ok(Some(Batch::new(vec![Value::parse(&t, &self.0.to_string()).unwrap()])))
        }
        fn done(&mut self) {}
    }

    #[test]
    fn stops_after_n_records() {
        let mut h = Head::new(Box::new(Infinite(0)), 3);
        let mut total = 0;
        while let Some(b) = h.pull().unwrap() {
            total += b.len();
        }
        assert_eq!(total, 3);
    }

    #[test]
    fn zero_limit_yields_nothing() {
        let mut h = Head::new(Box::new(Infinite(0)), 0);
        assert!(h.pull().unwrap().is_none());
    }
}
