//! A line-delimited-JSON `Reader`/`Writer` pair — enough of a concrete
//! source/sink to drive the CLI and integration tests against. This is
//! deliberately not a reimplementation of any of the out-of-scope format
//! readers (binary stream, columnar, cloud); each line's record type is
//! inferred independently from its own JSON shape, with no schema
//! evolution across records.

use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;

use zq_core::{primitive::decode_string, record_of, Context, Primitive, Value};
use zq_stream::{Reader, Writer};

use crate::error::{IoFormatError, Result};

fn infer_primitive(j: &serde_json::Value) -> Primitive {
    match j {
        serde_json::Value::Bool(_) => Primitive::Bool,
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Primitive::Int64,
        serde_json::Value::Number(_) => Primitive::Float64,
        serde_json::Value::String(_) => Primitive::String,
        serde_json::Value::Null => Primitive::Null,
        _ => Primitive::String,
    }
}

fn scalar_to_value(ctx: &Context, j: &serde_json::Value) -> Result<Value> {
    let ty = ctx.primitive(infer_primitive(j));
    match j {
        serde_json::Value::Null => Ok(Value::unset(ty)),
        serde_json::Value::Bool(b) => Ok(Value::parse(&ty, if *b { "true" } else { "false" })?),
        serde_json::Value::Number(n) => Ok(Value::parse(&ty, &n.to_string())?),
        serde_json::Value::String(s) => Ok(Value::parse(&ty, s)?),
        other => Err(IoFormatError::Unsupported(other.to_string())),
    }
}

/// Parses one line of newline-delimited JSON into a typed record, inferring
/// a fresh record type from the object's own top-level keys.
pub fn line_to_record(ctx: &Context, line: &str) -> Result<Value> {
    let parsed: serde_json::Value = serde_json::from_str(line)?;
    let obj = parsed
        .as_object()
        .ok_or_else(|| IoFormatError::NotAnObject(line.to_string()))?;
    let mut fields: Vec<(&str, Value)> = Vec::with_capacity(obj.len());
    for (name, v) in obj {
        fields.push((name.as_str(), scalar_to_value(ctx, v)?));
    }
    Ok(record_of(ctx, fields)?)
}

/// Renders a record back to a single line of JSON.
pub fn record_to_line(rec: &Value) -> Result<String> {
    Ok(serde_json::to_string(&rec.to_json()?)?)
}

fn access_string_field(rec: &Value, name: &str) -> Option<String> {
    rec.field_by_path(&[name]).and_then(|v| decode_string(v.bytes_or_empty()).ok())
}

/// Reads records from an NDJSON stream, one JSON object per line.
pub struct NdjsonReader<R> {
    lines: std::io::Lines<BufReader<R>>,
    ctx: Arc<Context>,
    name: String,
}

impl<R: std::io::Read> NdjsonReader<R> {
    pub fn new(inner: R, ctx: Arc<Context>, name: impl Into<String>) -> Self {
        NdjsonReader { lines: BufReader::new(inner).lines(), ctx, name: name.into() }
    }
}

impl NdjsonReader<std::fs::File> {
    pub fn open(path: impl AsRef<std::path::Path>, ctx: Arc<Context>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        Ok(NdjsonReader::new(file, ctx, path.display().to_string()))
    }
}

impl<R: std::io::Read + Send> Reader for NdjsonReader<R> {
    fn read(&mut self) -> zq_stream::Result<Option<Value>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            let line = line.map_err(IoFormatError::Io)?;
            if line.trim().is_empty() {
                continue;
            }
            return line_to_record(&self.ctx, &line)
                .map(Some)
                .map_err(|e| zq_stream::StreamError::Other(format!("{}: {e}", self.name)));
        }
    }
}

/// Writes records as one JSON object per line.
pub struct NdjsonWriter<W> {
    inner: W,
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(inner: W) -> Self {
        NdjsonWriter { inner }
    }
}

impl NdjsonWriter<std::fs::File> {
    pub fn create(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(NdjsonWriter::new(std::fs::File::create(path)?))
    }
}

impl<W: Write + Send> Writer for NdjsonWriter<W> {
    fn write(&mut self, rec: &Value) -> zq_stream::Result<()> {
        let line = record_to_line(rec).map_err(zq_stream::StreamError::from)?;
        writeln!(self.inner, "{line}").map_err(zq_stream::StreamError::Io)
    }
}

impl<W: Write + Send> zq_stream::WriteFlusher for NdjsonWriter<W> {
    fn flush(&mut self) -> zq_stream::Result<()> {
        self.inner.flush().map_err(zq_stream::StreamError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_flat_object() {
        let ctx = Context::new();
        let rec = line_to_record(&ctx, r#"{"a":1,"b":"x","c":true}"#).unwrap();
        let line = record_to_line(&rec).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["a"], 1);
        assert_eq!(parsed["b"], "x");
        assert_eq!(parsed["c"], true);
    }

    #[test]
    fn reader_yields_one_record_per_line() {
        let ctx = Arc::new(Context::new());
        let data = b"{\"x\":1}\n{\"x\":2}\n".to_vec();
        let mut r = NdjsonReader::new(std::io::Cursor::new(data), ctx, "test");
        let a = r.read().unwrap().unwrap();
        assert_eq!(access_string_field(&a, "missing"), None);
        let b = r.read().unwrap().unwrap();
        let _ = b;
        assert!(r.read().unwrap().is_none());
    }

    #[test]
    fn nested_object_is_unsupported() {
        let ctx = Context::new();
        let err = line_to_record(&ctx, r#"{"a":{"b":1}}"#).unwrap_err();
        assert!(matches!(err, IoFormatError::Unsupported(_)));
    }
}
