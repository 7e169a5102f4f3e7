//! Core stream interfaces. Grounded on `original_source/zbuf/zng.go`.
//!
//! `Reader::read` returns the next record, `Ok(None)` to signal end of
//! stream, or an error — never a record and an error together. Once a
//! reader has returned `Ok(None)`, every subsequent call must do the same
//! (spec §3's end-of-stream invariant).

use crate::error::Result;
use zq_core::Value;

pub trait Reader: Send {
    fn read(&mut self) -> Result<Option<Value>>;
}

pub trait Closer {
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub trait ReadCloser: Reader + Closer {}
impl<T: Reader + Closer> ReadCloser for T {}

pub trait Writer: Send {
    fn write(&mut self, rec: &Value) -> Result<()>;
}

pub trait WriteFlusher: Writer {
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Traversal direction for time-ordered streams and the archive resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Concatenates readers in sequence, advancing to the next on EOS of the
/// current one (`original_source/zbuf/zng.go`'s `multiReader`).
pub struct MultiReader {
    readers: Vec<Box<dyn Reader>>,
}

impl MultiReader {
    pub fn new(readers: Vec<Box<dyn Reader>>) -> Self {
        MultiReader { readers }
    }
}

impl Reader for MultiReader {
    fn read(&mut self) -> Result<Option<Value>> {
        while !self.readers.is_empty() {
            match self.readers[0].read()? {
                Some(rec) => return Ok(Some(rec)),
                None => {
                    self.readers.remove(0);
                }
            }
        }
        Ok(None)
    }
}

/// Fans a single record out to multiple writers; stops at the first error.
pub struct MultiWriter {
    writers: Vec<Box<dyn WriteFlusher>>,
}

impl MultiWriter {
    pub fn new(writers: Vec<Box<dyn WriteFlusher>>) -> Self {
        MultiWriter { writers }
    }
}

impl Writer for MultiWriter {
    fn write(&mut self, rec: &Value) -> Result<()> {
        for w in &mut self.writers {
            w.write(rec)?;
        }
        Ok(())
    }
}

impl WriteFlusher for MultiWriter {
    fn flush(&mut self) -> Result<()> {
        // Only the first error is surfaced; every writer is still flushed
        // (spec §7: "only the first of simultaneously-observed close/flush
        // errors is returned; all resources are still released").
        let mut first_err = None;
        for w in &mut self.writers {
            if let Err(e) = w.flush() {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Wraps a reader with a name for diagnostics (warnings, errors).
pub struct NamedReader<R> {
    pub reader: R,
    pub name: String,
}

impl<R: Reader> Reader for NamedReader<R> {
    fn read(&mut self) -> Result<Option<Value>> {
        self.reader.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecReader(std::vec::IntoIter<Value>);
    impl Reader for VecReader {
        fn read(&mut self) -> Result<Option<Value>> {
            Ok(self.0.next())
        }
    }

    fn int_val(ctx: &zq_core::Context, v: i64) -> Value {
        let t = ctx.primitive(zq_core::Primitive::Int64);
        Value::parse(&t, &v.to_string()).unwrap()
    }

    #[test]
    fn multi_reader_concatenates_in_order() {
        let ctx = zq_core::Context::new();
        let a = VecReader(vec![int_val(&ctx, 1), int_val(&ctx, 2)].into_iter());
        let b = VecReader(vec![int_val(&ctx, 3)].into_iter());
        let mut mr = MultiReader::new(vec![Box::new(a), Box::new(b)]);
        let mut out = Vec::new();
        while let Some(v) = mr.read().unwrap() {
            out.push(zq_core::primitive::decode_int(v.bytes_or_empty()).unwrap());
        }
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(mr.read().unwrap(), None);
    }
}
