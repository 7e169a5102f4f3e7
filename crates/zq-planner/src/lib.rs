//! # zq-planner — flowgraph rewrites over a compiled operator tree
//!
//! Each pass here is a pure rewrite of a [`zq_driver::CompiledOp`] tree:
//! lowering `every D` sugar into an explicit key, pruning unread source
//! columns, propagating a known sort order into a group-by, and
//! duplicating a stateless prefix across N parallel branches. None of
//! these passes touch the live operator DAG `zq_driver::compile` builds —
//! they run beforehand, on the AST.

pub mod columns;
pub mod every;
pub mod parallel;
pub mod sortdir;

pub use columns::{compute_columns, Columns};
pub use every::replace_groupby_duration_with_key;
pub use parallel::parallelize_flowgraph;
pub use sortdir::set_groupby_input_sort_dir;
