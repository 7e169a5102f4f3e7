//! # zq-outofcore — spill-to-disk `sort` and `group-by`
//!
//! The two pipeline operators whose working set can exceed memory: `sort`
//! accumulates up to a byte budget before spilling stably-sorted runs and
//! k-way merging them back; `group-by` keeps live per-key accumulators and
//! spills partial aggregates once too many distinct keys are live. Both
//! reuse the length-framed [`spill`] file format and the multi-key
//! [`cmp`] comparator.

pub mod cmp;
pub mod error;
pub mod groupby;
pub mod reducer;
pub mod sort;
pub mod spill;

pub use cmp::{as_sort_fn, build_comparator, CmpFn};
pub use error::{OutOfCoreError, Result};
pub use groupby::{Aggregation, GroupBy, DEFAULT_GROUPBY_LIMIT};
pub use reducer::{Partial, Reducer, ReducerKind, COUNTDISTINCT_EXACT_CAP};
pub use sort::{Sort, DEFAULT_SORT_MEM_MAX_BYTES};
pub use spill::{read_record, write_record, SpillFile, SpillReader, SpillWriter};
