//! External sort with spill-to-disk. Grounded on
//! `original_source/zio/zngio/sort.go`'s `SortReader`: records accumulate
//! in memory up to a byte budget (128MiB default, same as the original's
//! `SortMemMaxBytes`), each full batch is stably sorted and flushed to a
//! temp file, and the final result is a k-way merge of the spilled runs
//! plus whatever's left in memory — or, if nothing ever spilled, the
//! sorted in-memory batch is served directly with no merge at all.

use crate::cmp::{as_sort_fn, CmpFn};
use crate::error::Result;
use crate::spill::SpillFile;
use std::path::PathBuf;
use std::sync::Arc;
use zq_core::{Context, Value};
use zq_pipeline::{PipelineError, Proc};
use zq_stream::{Batch, Combiner, Reader};

pub const DEFAULT_SORT_MEM_MAX_BYTES: usize = 128 * 1024 * 1024;

struct VecReader(std::vec::IntoIter<Value>);
impl Reader for VecReader {
    fn read(&mut self) -> zq_stream::Result<Option<Value>> {
        Ok(self.0.next())
    }
}

const OUTPUT_BATCH_SIZE: usize = 256;

pub struct Sort {
    upstream: Option<Box<dyn Proc>>,
    cmp: CmpFn,
    max_bytes: usize,
    tmp_dir: PathBuf,
    ctx: Arc<Context>,
    // Kept alive so the temp files aren't removed (Drop) until the operator is.
    _spill_files: Vec<SpillFile>,
    output: Option<Box<dyn Reader>>,
}

impl Sort {
    pub fn new(upstream: Box<dyn Proc>, cmp: CmpFn, ctx: Arc<Context>, tmp_dir: PathBuf) -> Self {
        Sort {
            upstream: Some(upstream),
            cmp,
            max_bytes: DEFAULT_SORT_MEM_MAX_BYTES,
            tmp_dir,
            ctx,
            _spill_files: Vec::new(),
            output: None,
        }
    }

    pub fn with_mem_budget(mut self, bytes: usize) -> Self {
        self.max_bytes = bytes;
        self
    }

    fn flush_run(&mut self, mut records: Vec<Value>) -> Result<()> {
        records.sort_by(|a, b| (self.cmp)(a, b));
        let (file, mut writer) = SpillFile::create_writer(&self.tmp_dir)?;
        for rec in &records {
            writer.write(rec)?;
        }
        writer.finish()?;
        self._spill_files.push(file);
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        let mut upstream = self.upstream.take().expect("build called once");
        let mut current: Vec<Value> = Vec::new();
        let mut current_bytes = 0usize;
        loop {
            match upstream.pull()? {
                None => break,
                Some(batch) => {
                    for rec in batch.into_records() {
                        current_bytes += rec.bytes.as_ref().map(|b| b.len()).unwrap_or(0);
                        current.push(rec);
                        if current_bytes >= self.max_bytes {
                            let run = std::mem::take(&mut current);
                            self.flush_run(run)?;
                            current_bytes = 0;
                        }
                    }
                }
            }
        }
        current.sort_by(|a, b| (self.cmp)(a, b));

        if self._spill_files.is_empty() {
            self.output = Some(Box::new(VecReader(current.into_iter())));
            return Ok(());
        }
        if !current.is_empty() {
            let (file, mut writer) = SpillFile::create_writer(&self.tmp_dir)?;
            for rec in &current {
                writer.write(rec)?;
            }
            writer.finish()?;
            self._spill_files.push(file);
        }
        let mut readers: Vec<Box<dyn Reader>> = Vec::with_capacity(self._spill_files.len());
        for f in &self._spill_files {
            readers.push(Box::new(f.open_reader(self.ctx.clone())?));
        }
        self.output = Some(Box::new(Combiner::new(readers, as_sort_fn(self.cmp.clone()))));
        Ok(())
    }
}

impl Proc for Sort {
    fn pull(&mut self) -> zq_pipeline::Result<Option<Batch>> {
        if self.output.is_none() {
            self.build().map_err(|e| PipelineError::Other(e.to_string()))?;
        }
        let reader = self.output.as_mut().unwrap();
        let mut out = Vec::with_capacity(OUTPUT_BATCH_SIZE);
        while out.len() < OUTPUT_BATCH_SIZE {
            match reader.read() {
                Ok(Some(v)) => out.push(v),
                Ok(None) => break,
                Err(e) => return Err(PipelineError::Stream(e)),
            }
        }
        if out.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Batch::new(out)))
        }
    }

    fn done(&mut self) {
        if let Some(u) = self.upstream.as_mut() {
            u.done();
        }
        self.output = Some(Box::new(VecReader(Vec::new().into_iter())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::Primitive;

    struct VecProc(std::vec::IntoIter<Value>);
    impl Proc for VecProc {
        fn pull(&mut self) -> zq_pipeline::Result<Option<Batch>> {
            match self.0.next() {
                Some(v) => Ok(Some(Batch::new(vec![v]))),
                None => Ok(None),
            }
        }
        fn done(&mut self) {}
    }

    #[test]
    fn sorts_without_spilling() {
        let ctx = Arc::new(Context::new());
        let t = ctx.primitive(Primitive::Int64);
        let vals = vec!["3", "1", "2"].into_iter().map(|s| Value::parse(&t, s).unwrap()).collect::<Vec<_>>();
        let upstream = Box::new(VecProc(vals.into_iter()));
        let cmp: CmpFn = Arc::new(|a: &Value, b: &Value| zq_core::compare(a, b));
        let mut sort = Sort::new(upstream, cmp, ctx, std::env::temp_dir().join("zq-sort-test"));
        let out = sort.pull().unwrap().unwrap();
        let got: Vec<i64> = out
            .records()
            .iter()
            .map(|v| zq_core::primitive::decode_int(v.bytes_or_empty()).unwrap())
            .collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn sorts_with_spilling() {
        let ctx = Arc::new(Context::new());
        let t = ctx.primitive(Primitive::Int64);
        let vals: Vec<Value> = (0..100).rev().map(|i| Value::parse(&t, &i.to_string()).unwrap()).collect();
        let upstream = Box::new(VecProc(vals.into_iter()));
        let cmp: CmpFn = Arc::new(|a, b| zq_core::compare(a, b));
        let mut sort = Sort::new(upstream, cmp, ctx, std::env::temp_dir().join("zq-sort-test-spill"))
            .with_mem_budget(8);
        let mut got = Vec::new();
        while let Some(b) = sort.pull().unwrap() {
            for v in b.records() {
                got.push(zq_core::primitive::decode_int(v.bytes_or_empty()).unwrap());
            }
        }
        let expected: Vec<i64> = (0..100).collect();
        assert_eq!(got, expected);
    }
}
