//! Group-by reducers: `count`, `sum`, `avg`, `min`, `max`, `first`, `last`,
//! `countdistinct`. Each carries enough state to both finish locally and
//! merge with another partial of the same kind, which is what lets
//! `group-by` run as two stages (partial, then final) across a
//! parallelized flowgraph. Grounded on `original_source/reducer/first.go`
//! and `original_source/reducer/field/int.go`'s consume/result shape.

use fnv::FnvHasher;
use std::any::Any;
use std::collections::{BTreeSet, HashSet};
use std::hash::Hasher;
use zq_core::{primitive as prim, Context, Primitive, Value};

/// Above this many distinct values, `countdistinct` stops storing exact
/// encodings and switches to hashing them into a `HashSet<u64>` instead —
/// bounded memory at the cost of rare hash-collision undercounts, which is
/// the approximate mode named in the countdistinct open question.
pub const COUNTDISTINCT_EXACT_CAP: usize = 65536;

pub trait Reducer: Send {
    fn consume(&mut self, v: Option<&Value>);
    fn result(&self, ctx: &Context) -> Value;
    fn merge_from(&mut self, other: &dyn Reducer);
    fn as_any(&self) -> &dyn Any;
    fn clone_box(&self) -> Box<dyn Reducer>;

    /// Captures enough state to reconstruct this reducer elsewhere — used
    /// to spill a partially-aggregated group to disk and fold it back in
    /// during the merge pass.
    fn snapshot(&self) -> Partial;
    fn merge_snapshot(&mut self, p: &Partial);
}

/// A reducer's state, detached from the reducer itself so it can be
/// written to a spill file and read back by a fresh reducer of the same
/// kind. One variant per reducer kind; `ReducerKind` picks which applies.
#[derive(Clone)]
pub enum Partial {
    Count(u64),
    Sum(f64),
    Avg(f64, u64),
    Value(Option<Value>),
    CountDistinctExact(Vec<Vec<u8>>),
    CountDistinctApprox(Vec<u64>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReducerKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    CountDistinct,
}

impl ReducerKind {
    pub fn new_reducer(self) -> Box<dyn Reducer> {
        match self {
            ReducerKind::Count => Box::new(CountReducer::default()),
            ReducerKind::Sum => Box::new(SumReducer::default()),
            ReducerKind::Avg => Box::new(AvgReducer::default()),
            ReducerKind::Min => Box::new(MinMaxReducer::new(true)),
            ReducerKind::Max => Box::new(MinMaxReducer::new(false)),
            ReducerKind::First => Box::new(FirstLastReducer::new(true)),
            ReducerKind::Last => Box::new(FirstLastReducer::new(false)),
            ReducerKind::CountDistinct => Box::new(CountDistinctReducer::default()),
        }
    }
}

#[derive(Default, Clone)]
pub struct CountReducer {
    n: u64,
}
impl Reducer for CountReducer {
    fn consume(&mut self, _v: Option<&Value>) {
        self.n += 1;
    }
    fn result(&self, ctx: &Context) -> Value {
        let t = ctx.primitive(Primitive::Uint64);
        Value::new(t, prim::encode_uint(self.n))
    }
    fn merge_from(&mut self, other: &dyn Reducer) {
        if let Some(o) = other.as_any().downcast_ref::<CountReducer>() {
            self.n += o.n;
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn clone_box(&self) -> Box<dyn Reducer> {
        Box::new(self.clone())
    }
    fn snapshot(&self) -> Partial {
        Partial::Count(self.n)
    }
    fn merge_snapshot(&mut self, p: &Partial) {
        if let Partial::Count(n) = p {
            self.n += n;
        }
    }
}

fn value_as_f64(v: &Value) -> Option<f64> {
    let ty = v.ty.as_ref()?;
    let bytes = v.bytes.as_deref()?;
    let aliased = Context::aliased(ty);
    match aliased.kind() {
        zq_core::TypeKind::Primitive(Primitive::Float64) => prim::decode_f64(bytes).ok(),
        zq_core::TypeKind::Primitive(
            Primitive::Int8 | Primitive::Int16 | Primitive::Int32 | Primitive::Int64,
        ) => prim::decode_int(bytes).ok().map(|i| i as f64),
        zq_core::TypeKind::Primitive(
            Primitive::Uint8 | Primitive::Uint16 | Primitive::Uint32 | Primitive::Uint64,
        ) => prim::decode_uint(bytes).ok().map(|u| u as f64),
        _ => None,
    }
}

#[derive(Default, Clone)]
pub struct SumReducer {
    sum: f64,
}
impl Reducer for SumReducer {
    fn consume(&mut self, v: Option<&Value>) {
        if let Some(f) = v.and_then(value_as_f64) {
            self.sum += f;
        }
    }
    fn result(&self, ctx: &Context) -> Value {
        let t = ctx.primitive(Primitive::Float64);
        Value::new(t, self.sum.to_le_bytes().to_vec())
    }
    fn merge_from(&mut self, other: &dyn Reducer) {
        if let Some(o) = other.as_any().downcast_ref::<SumReducer>() {
            self.sum += o.sum;
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn clone_box(&self) -> Box<dyn Reducer> {
        Box::new(self.clone())
    }
    fn snapshot(&self) -> Partial {
        Partial::Sum(self.sum)
    }
    fn merge_snapshot(&mut self, p: &Partial) {
        if let Partial::Sum(s) = p {
            self.sum += s;
        }
    }
}

#[derive(Default, Clone)]
pub struct AvgReducer {
    sum: f64,
    count: u64,
}
impl Reducer for AvgReducer {
    fn consume(&mut self, v: Option<&Value>) {
        if let Some(f) = v.and_then(value_as_f64) {
            self.sum += f;
            self.count += 1;
        }
    }
    fn result(&self, ctx: &Context) -> Value {
        let avg = if self.count == 0 { 0.0 } else { self.sum / self.count as f64 };
        let t = ctx.primitive(Primitive::Float64);
        Value::new(t, avg.to_le_bytes().to_vec())
    }
    fn merge_from(&mut self, other: &dyn Reducer) {
        if let Some(o) = other.as_any().downcast_ref::<AvgReducer>() {
            self.sum += o.sum;
            self.count += o.count;
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn clone_box(&self) -> Box<dyn Reducer> {
        Box::new(self.clone())
    }
    fn snapshot(&self) -> Partial {
        Partial::Avg(self.sum, self.count)
    }
    fn merge_snapshot(&mut self, p: &Partial) {
        if let Partial::Avg(s, c) = p {
            self.sum += s;
            self.count += c;
        }
    }
}

#[derive(Clone)]
pub struct MinMaxReducer {
    want_min: bool,
    best: Option<Value>,
}
impl MinMaxReducer {
    fn new(want_min: bool) -> Self {
        MinMaxReducer { want_min, best: None }
    }
}
impl Reducer for MinMaxReducer {
    fn consume(&mut self, v: Option<&Value>) {
        let Some(v) = v else { return };
        match &self.best {
            None => self.best = Some(v.clone()),
            Some(cur) => {
                let ord = zq_core::compare(v, cur);
                let take = if self.want_min { ord.is_lt() } else { ord.is_gt() };
                if take {
                    self.best = Some(v.clone());
                }
            }
        }
    }
    fn result(&self, _ctx: &Context) -> Value {
        self.best.clone().unwrap_or_else(Value::nil)
    }
    fn merge_from(&mut self, other: &dyn Reducer) {
        if let Some(o) = other.as_any().downcast_ref::<MinMaxReducer>() {
            if let Some(ov) = &o.best {
                self.consume(Some(ov));
            }
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn clone_box(&self) -> Box<dyn Reducer> {
        Box::new(self.clone())
    }
    fn snapshot(&self) -> Partial {
        Partial::Value(self.best.clone())
    }
    fn merge_snapshot(&mut self, p: &Partial) {
        if let Partial::Value(Some(v)) = p {
            self.consume(Some(v));
        }
    }
}

#[derive(Clone)]
pub struct FirstLastReducer {
    want_first: bool,
    value: Option<Value>,
}
impl FirstLastReducer {
    fn new(want_first: bool) -> Self {
        FirstLastReducer { want_first, value: None }
    }
}
impl Reducer for FirstLastReducer {
    fn consume(&mut self, v: Option<&Value>) {
        let Some(v) = v else { return };
        if self.want_first {
            if self.value.is_none() {
                self.value = Some(v.clone());
            }
        } else {
            self.value = Some(v.clone());
        }
    }
    fn result(&self, _ctx: &Context) -> Value {
        self.value.clone().unwrap_or_else(Value::nil)
    }
    fn merge_from(&mut self, other: &dyn Reducer) {
        if let Some(o) = other.as_any().downcast_ref::<FirstLastReducer>() {
            if let Some(ov) = &o.value {
                self.consume(Some(ov));
            }
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn clone_box(&self) -> Box<dyn Reducer> {
        Box::new(self.clone())
    }
    fn snapshot(&self) -> Partial {
        Partial::Value(self.value.clone())
    }
    fn merge_snapshot(&mut self, p: &Partial) {
        if let Partial::Value(Some(v)) = p {
            self.consume(Some(v));
        }
    }
}

#[derive(Clone)]
enum CountDistinctState {
    Exact(BTreeSet<Vec<u8>>),
    Approx(HashSet<u64>),
}

#[derive(Clone)]
pub struct CountDistinctReducer {
    state: CountDistinctState,
}

impl Default for CountDistinctReducer {
    fn default() -> Self {
        CountDistinctReducer { state: CountDistinctState::Exact(BTreeSet::new()) }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

impl CountDistinctReducer {
    fn downgrade(&mut self) {
        if let CountDistinctState::Exact(set) = &self.state {
            let hashes = set.iter().map(|b| fnv1a(b)).collect();
            self.state = CountDistinctState::Approx(hashes);
        }
    }
}

impl Reducer for CountDistinctReducer {
    fn consume(&mut self, v: Option<&Value>) {
        let Some(v) = v else { return };
        let bytes = v.bytes_or_empty().to_vec();
        match &mut self.state {
            CountDistinctState::Exact(set) => {
                set.insert(bytes);
                if set.len() > COUNTDISTINCT_EXACT_CAP {
                    self.downgrade();
                }
            }
            CountDistinctState::Approx(set) => {
                set.insert(fnv1a(&bytes));
            }
        }
    }
    fn result(&self, ctx: &Context) -> Value {
        let n = match &self.state {
            CountDistinctState::Exact(set) => set.len() as u64,
            CountDistinctState::Approx(set) => set.len() as u64,
        };
        let t = ctx.primitive(Primitive::Uint64);
        Value::new(t, prim::encode_uint(n))
    }
    fn merge_from(&mut self, other: &dyn Reducer) {
        let Some(o) = other.as_any().downcast_ref::<CountDistinctReducer>() else { return };
        match (&mut self.state, &o.state) {
            (CountDistinctState::Exact(a), CountDistinctState::Exact(b)) => {
                a.extend(b.iter().cloned());
                if a.len() > COUNTDISTINCT_EXACT_CAP {
                    self.downgrade();
                }
            }
            (CountDistinctState::Approx(a), CountDistinctState::Approx(b)) => {
                a.extend(b.iter().copied());
            }
            (CountDistinctState::Exact(_), CountDistinctState::Approx(b)) => {
                self.downgrade();
                if let CountDistinctState::Approx(a) = &mut self.state {
                    a.extend(b.iter().copied());
                }
            }
            (CountDistinctState::Approx(a), CountDistinctState::Exact(b)) => {
                a.extend(b.iter().map(|x| fnv1a(x)));
            }
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn clone_box(&self) -> Box<dyn Reducer> {
        Box::new(self.clone())
    }
    fn snapshot(&self) -> Partial {
        match &self.state {
            CountDistinctState::Exact(set) => Partial::CountDistinctExact(set.iter().cloned().collect()),
            CountDistinctState::Approx(set) => Partial::CountDistinctApprox(set.iter().copied().collect()),
        }
    }
    fn merge_snapshot(&mut self, p: &Partial) {
        match p {
            Partial::CountDistinctExact(entries) => {
                if let CountDistinctState::Exact(set) = &mut self.state {
                    set.extend(entries.iter().cloned());
                    if set.len() > COUNTDISTINCT_EXACT_CAP {
                        self.downgrade();
                    }
                } else if let CountDistinctState::Approx(set) = &mut self.state {
                    set.extend(entries.iter().map(|b| fnv1a(b)));
                }
            }
            Partial::CountDistinctApprox(hashes) => {
                self.downgrade();
                if let CountDistinctState::Approx(set) = &mut self.state {
                    set.extend(hashes.iter().copied());
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(ctx: &Context, v: i64) -> Value {
        let t = ctx.primitive(Primitive::Int64);
        Value::parse(&t, &v.to_string()).unwrap()
    }

    #[test]
    fn count_and_sum() {
        let ctx = Context::new();
        let mut count = CountReducer::default();
        let mut sum = SumReducer::default();
        for v in [1, 2, 3] {
            let val = iv(&ctx, v);
            count.consume(Some(&val));
            sum.consume(Some(&val));
        }
        assert_eq!(prim::decode_uint(count.result(&ctx).bytes_or_empty()).unwrap(), 3);
        assert_eq!(prim::decode_f64(sum.result(&ctx).bytes_or_empty()).unwrap(), 6.0);
    }

    #[test]
    fn min_max_merge() {
        let ctx = Context::new();
        let mut min_a = MinMaxReducer::new(true);
        min_a.consume(Some(&iv(&ctx, 5)));
        let mut min_b = MinMaxReducer::new(true);
        min_b.consume(Some(&iv(&ctx, 2)));
        min_a.merge_from(&min_b);
        assert_eq!(prim::decode_int(min_a.result(&ctx).bytes_or_empty()).unwrap(), 2);
    }

    #[test]
    fn countdistinct_downgrades_past_cap() {
        let ctx = Context::new();
        let mut cd = CountDistinctReducer::default();
        for i in 0..(COUNTDISTINCT_EXACT_CAP + 10) as i64 {
            cd.consume(Some(&iv(&ctx, i)));
        }
        assert!(matches!(cd.state, CountDistinctState::Approx(_)));
        let n = prim::decode_uint(cd.result(&ctx).bytes_or_empty()).unwrap();
        assert!(n as usize >= COUNTDISTINCT_EXACT_CAP);
    }
}
