//! One-record lookahead wrapper, used by operators (`uniq`, `sort`'s
//! streaming fast path) that need to inspect the next record before
//! deciding whether to consume it.

use crate::error::Result;
use crate::rw::Reader;
use zq_core::Value;

pub struct Peeker<R> {
    reader: R,
    lookahead: Option<Option<Value>>,
}

impl<R: Reader> Peeker<R> {
    pub fn new(reader: R) -> Self {
        Peeker { reader, lookahead: None }
    }

    /// Returns the next record without consuming it. Repeated calls without
    /// an intervening `read()` return the same record.
    pub fn peek(&mut self) -> Result<Option<&Value>> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.reader.read()?);
        }
        Ok(self.lookahead.as_ref().unwrap().as_ref())
    }
}

impl<R: Reader> Reader for Peeker<R> {
    fn read(&mut self) -> Result<Option<Value>> {
        if let Some(v) = self.lookahead.take() {
            return Ok(v);
        }
        self.reader.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::{Context, Primitive};

    struct VecReader(std::vec::IntoIter<Value>);
    impl Reader for VecReader {
        fn read(&mut self) -> Result<Option<Value>> {
            Ok(self.0.next())
        }
    }

    fn iv(ctx: &Context, v: i64) -> Value {
        let t = ctx.primitive(Primitive::Int64);
        Value::parse(&t, &v.to_string()).unwrap()
    }

    #[test]
    fn peek_does_not_consume() {
        let ctx = Context::new();
        let r = VecReader(vec![iv(&ctx, 1), iv(&ctx, 2)].into_iter());
        let mut p = Peeker::new(r);
        let peeked = p.peek().unwrap().cloned();
        assert_eq!(
            zq_core::primitive::decode_int(peeked.unwrap().bytes_or_empty()).unwrap(),
            1
        );
        let read = p.read().unwrap().unwrap();
        assert_eq!(
            zq_core::primitive::decode_int(read.bytes_or_empty()).unwrap(),
            1
        );
        let read2 = p.read().unwrap().unwrap();
        assert_eq!(
            zq_core::primitive::decode_int(read2.bytes_or_empty()).unwrap(),
            2
        );
        assert!(p.read().unwrap().is_none());
    }

    #[test]
    fn peek_at_eos_is_stable() {
        let ctx = Context::new();
        let r = VecReader(vec![].into_iter());
        let mut p = Peeker::new(r);
        let _ = ctx;
        assert!(p.peek().unwrap().is_none());
        assert!(p.peek().unwrap().is_none());
        assert!(p.read().unwrap().is_none());
    }
}
