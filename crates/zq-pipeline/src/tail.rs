//! `tail` — passes through only the last N records, implemented as a ring
//! buffer that must drain all of upstream before it can emit anything.

use crate::error::Result;
use crate::proc::Proc;
use std::collections::VecDeque;
use zq_core::Value;
use zq_stream::Batch;

pub struct Tail {
    upstream: Box<dyn Proc>,
    limit: usize,
    ring: VecDeque<Value>,
    drained: bool,
    emitted: bool,
}

impl Tail {
    pub fn new(upstream: Box<dyn Proc>, limit: usize) -> Self {
        Tail { upstream, limit, ring: VecDeque::with_capacity(limit), drained: false, emitted: false }
    }
}

impl Proc for Tail {
    fn pull(&mut self) -> Result<Option<Batch>> {
        if self.emitted {
            return Ok(None);
        }
        if !self.drained {
            while let Some(batch) = self.upstream.pull()? {
                for rec in batch.into_records() {
                    if self.ring.len() == self.limit {
                        self.ring.pop_front();
                    }
                    if self.limit > 0 {
                        self.ring.push_back(rec);
                    }
                }
            }
            self.drained = true;
        }
        self.emitted = true;
        if self.ring.is_empty() {
            return Ok(None);
        }
        Ok(Some(Batch::new(self.ring.drain(..).collect())))
    }

    fn done(&mut self) {
        self.emitted = true;
        self.upstream.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn keeps_only_last_n() {
        let ctx = Context::new();
        let t = ctx.primitive(Primitive::Int64);
        let vals: Vec<Value> = (1..=5).map(|i| Value::parse(&t, &i.to_string()).unwrap()).collect();
        let mut tail = Tail::new(Box::new(VecProc(vals.into_iter())), 2);
        let out = tail.pull().unwrap().unwrap();
        let got: Vec<i64> = out
            .records()
            .iter()
            .map(|v| zq_core::primitive::decode_int(v.bytes_or_empty()).unwrap())
            .collect();
        assert_eq!(got, vec![4, 5]);
        assert!(tail.pull().unwrap().is_none());
    }
}
