//! Length-framed spill files: each record is written as `(type_id,
//! tagged-length-prefixed bytes)`, reusing the container child framing from
//! `zq_core::zcode` at the record level. Grounded on
//! `original_source/zio/zngio/sort.go`'s `flushBatch`/temp-file scheme,
//! generalized to be shared by both `sort` and `group-by`'s spill path.

use crate::error::{OutOfCoreError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zq_core::zcode::append_uvarint;
use zq_core::{Context, Value};

/// No type carries this id; used to frame a record with no declared type
/// (a bare nil literal) without a sentinel byte.
const UNTYPED: u64 = u64::MAX;

pub fn write_record<W: Write>(w: &mut W, v: &Value) -> Result<()> {
    let mut header = Vec::new();
    let type_id = v.ty.as_ref().map(|t| t.id() as u64).unwrap_or(UNTYPED);
    append_uvarint(&mut header, type_id);
    match &v.bytes {
        None => append_uvarint(&mut header, 0),
        Some(b) => append_uvarint(&mut header, b.len() as u64 + 1),
    }
    w.write_all(&header)?;
    if let Some(b) = &v.bytes {
        w.write_all(b)?;
    }
    Ok(())
}

fn read_uvarint_stream<R: Read>(r: &mut R) -> Result<Option<u64>> {
    let mut v: u64 = 0;
    let mut shift = 0u32;
    let mut first = true;
    loop {
        let mut byte = [0u8; 1];
        match r.read(&mut byte)? {
            0 if first => return Ok(None),
            0 => return Err(OutOfCoreError::Other("truncated spill record".into())),
            _ => {}
        }
        first = false;
        v |= ((byte[0] & 0x7f) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(v));
        }
        shift += 7;
    }
}

pub fn read_record<R: Read>(r: &mut R, ctx: &Context) -> Result<Option<Value>> {
    let Some(type_id) = read_uvarint_stream(r)? else {
        return Ok(None);
    };
    let ty = if type_id == UNTYPED { None } else { ctx.lookup_by_id(type_id as u32) };
    let tag = read_uvarint_stream(r)?
        .ok_or_else(|| OutOfCoreError::Other("truncated spill record".into()))?;
    let bytes = if tag == 0 {
        None
    } else {
        let len = (tag - 1) as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        Some(buf)
    };
    Ok(Some(Value { ty, bytes }))
}

pub struct SpillFile {
    path: PathBuf,
}

impl SpillFile {
    pub fn create_writer(dir: &Path) -> Result<(Self, SpillWriter)> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("spill-{}.zq", unique_suffix()));
        let file = File::create(&path)?;
        Ok((SpillFile { path: path.clone() }, SpillWriter { w: BufWriter::new(file) }))
    }

    pub fn open_reader(&self, ctx: Arc<Context>) -> Result<SpillReader> {
        let file = File::open(&self.path)?;
        Ok(SpillReader { r: BufReader::new(file), ctx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub(crate) fn unique_suffix() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    format!("{pid}-{n}")
}

pub struct SpillWriter {
    w: BufWriter<File>,
}

impl SpillWriter {
    pub fn write(&mut self, v: &Value) -> Result<()> {
        write_record(&mut self.w, v)
    }

    pub fn finish(mut self) -> Result<()> {
        self.w.flush()?;
        Ok(())
    }
}

pub struct SpillReader {
    r: BufReader<File>,
    ctx: Arc<Context>,
}

impl zq_stream::Reader for SpillReader {
    fn read(&mut self) -> zq_stream::Result<Option<Value>> {
        read_record(&mut self.r, &self.ctx).map_err(|e| zq_stream::StreamError::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::Primitive;

    mod tempfile_like_dir {
        pub fn dir() -> std::path::PathBuf {
            let mut p = std::env::temp_dir();
            p.push(format!("zq-outofcore-test-{}", std::process::id()));
            p
        }
    }

    #[test]
    fn writes_and_reads_back_records() {
        let ctx = Arc::new(Context::new());
        let t = ctx.primitive(Primitive::Int64);
        let dir = tempfile_like_dir::dir();
        let (file, mut writer) = SpillFile::create_writer(&dir).unwrap();
        for v in [1i64, 2, 3] {
            writer.write(&Value::parse(&t, &v.to_string()).unwrap()).unwrap();
        }
        writer.finish().unwrap();

        let mut reader = file.open_reader(ctx).unwrap();
        let mut got = Vec::new();
        while let Some(v) = zq_stream::Reader::read(&mut reader).unwrap() {
            got.push(zq_core::primitive::decode_int(v.bytes_or_empty()).unwrap());
        }
        assert_eq!(got, vec![1, 2, 3]);
    }
}
