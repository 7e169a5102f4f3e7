//! K-way ordered merge of N readers under a comparator. Grounded directly
//! on `original_source/zbuf/combiner.go`.

use crate::error::Result;
use crate::rw::Reader;
use zq_core::Value;

/// `less(a, b)` returns `Ordering::Less` if `a` sorts before `b`.
pub type SortFn = Box<dyn Fn(&Value, &Value) -> std::cmp::Ordering + Send>;

pub struct Combiner {
    readers: Vec<Box<dyn Reader>>,
    hol: Vec<Option<Value>>,
    done: Vec<bool>,
    sort_fn: SortFn,
}

impl Combiner {
    pub fn new(readers: Vec<Box<dyn Reader>>, sort_fn: SortFn) -> Self {
        let n = readers.len();
        Combiner {
            readers,
            hol: (0..n).map(|_| None).collect(),
            done: vec![false; n],
            sort_fn,
        }
    }

    /// Sort-by-timestamp convenience comparator used by the default archive
    /// and sort configurations (`SortTsAscending`/`SortTsDescending` in the
    /// original).
    pub fn ts_comparator(desc: bool, ts_field: &'static str) -> SortFn {
        Box::new(move |a, b| {
            let ats = a.field_by_path(&[ts_field]);
            let bts = b.field_by_path(&[ts_field]);
            let ord = match (ats, bts) {
                (Some(av), Some(bv)) => zq_core::compare(&av, &bv),
                _ => std::cmp::Ordering::Equal,
            };
            if desc {
                ord.reverse()
            } else {
                ord
            }
        })
    }
}

impl Reader for Combiner {
    fn read(&mut self) -> Result<Option<Value>> {
        let mut idx: Option<usize> = None;
        for k in 0..self.readers.len() {
            if self.done[k] {
                continue;
            }
            if self.hol[k].is_none() {
                match self.readers[k].read()? {
                    Some(rec) => self.hol[k] = Some(rec),
                    None => {
                        self.done[k] = true;
                        continue;
                    }
                }
            }
            idx = Some(match idx {
                None => k,
                Some(cur) => {
                    let a = self.hol[k].as_ref().unwrap();
                    let b = self.hol[cur].as_ref().unwrap();
                    if (self.sort_fn)(a, b) == std::cmp::Ordering::Less {
                        k
                    } else {
                        cur
                    }
                }
            });
        }
        match idx {
            None => Ok(None),
            Some(k) => Ok(self.hol[k].take()),
        }
    }
}

impl crate::rw::Closer for Combiner {
    fn close(&mut self) -> Result<()> {
        // Reader doesn't itself require Closer; this just marks every slot
        // done so a subsequent read() is a guaranteed EOS.
        for d in self.done.iter_mut() {
            *d = true;
        }
        Ok(())
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
    fn merges_two_sorted_readers_stably() {
        let ctx = Context::new();
        let a = VecReader(vec![iv(&ctx, 1), iv(&ctx, 3), iv(&ctx, 5)].into_iter());
        let b = VecReader(vec![iv(&ctx, 2), iv(&ctx, 4)].into_iter());
        let cmp: SortFn = Box::new(|a, b| zq_core::compare(a, b));
        let mut c = Combiner::new(vec![Box::new(a), Box::new(b)], cmp);
        let mut out = Vec::new();
        while let Some(v) = c.read().unwrap() {
            out.push(zq_core::primitive::decode_int(v.bytes_or_empty()).unwrap());
        }
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
        assert_eq!(c.read().unwrap(), None);
    }

    #[test]
    fn all_done_yields_eos_repeatedly() {
        let ctx = Context::new();
        let a = VecReader(vec![].into_iter());
        let cmp: SortFn = Box::new(|a, b| zq_core::compare(a, b));
        let mut c = Combiner::new(vec![Box::new(a)], cmp);
        assert!(c.read().unwrap().is_none());
        let _ = ctx;
        assert!(c.read().unwrap().is_none());
    }
}
