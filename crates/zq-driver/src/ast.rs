//! The compiled operator tree: a `serde`-deserializable AST handed to
//! [`crate::compile::compile`], generalizing the teacher's
//! `PipelineSpec`/`TransformSpec`/`SourceSpec`/`SinkSpec` chain from a fixed
//! source→transform→sink line into an arbitrary tree (so `merge` and
//! `parallel` fan-out, which both have more than one parent, have somewhere
//! to live). Parsing this tree out of query text is out of scope; this is
//! the wire format a planner or a hand-written query would target.

use serde::{Deserialize, Serialize};

/// A literal pattern for a comparison or a `put` right-hand side, carrying
/// its own declared kind so the compiler knows which `zq_core::Primitive`
/// to parse it against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum LiteralSpec {
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Regexp(String),
}

/// A `put` right-hand side: a field reference, a literal, or a call into
/// the function registry (`zq_expr::lookup_function`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "expr")]
pub enum ExprSpec {
    Field { path: String },
    Literal { value: LiteralSpec },
    Call { name: String, args: Vec<ExprSpec> },
}

/// A `filter` predicate tree. `Compare` is scoped to a single field path;
/// bare-value comparisons (as used inside `contains`) aren't expressible
/// here since every compiled filter acts on whole records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "pred")]
pub enum PredSpec {
    Compare { field: String, op: String, literal: LiteralSpec },
    And(Vec<PredSpec>),
    Or(Vec<PredSpec>),
    Not(Box<PredSpec>),
}

/// One reducer slot in a `group-by`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggSpec {
    pub name: String,
    pub kind: String,
    pub input: Option<String>,
}

/// A sort key: field path plus descending flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortKeySpec {
    pub field: String,
    pub desc: bool,
}

/// The `every D` clause on a group-by, named by the timestamp field it
/// buckets and the duration literal passed to `Time.trunc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EveryDuration {
    pub ts_field: String,
    pub duration: String,
}

/// The compiled operator tree. Every non-leaf variant owns its upstream(s)
/// directly (rather than by id + edge list, as the teacher's
/// `PipelineSpec::edges` does) since that's the natural shape for a tree
/// rather than a source/transform/sink DAG of bounded depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum CompiledOp {
    /// The external reader passed to `compile()`. Always a leaf.
    Source,
    Filter {
        pred: PredSpec,
        upstream: Box<CompiledOp>,
    },
    Cut {
        fields: Vec<String>,
        complement: bool,
        strict: bool,
        upstream: Box<CompiledOp>,
    },
    Put {
        assignments: Vec<(String, ExprSpec)>,
        upstream: Box<CompiledOp>,
    },
    Rename {
        renames: Vec<(String, String)>,
        upstream: Box<CompiledOp>,
    },
    Head {
        limit: usize,
        upstream: Box<CompiledOp>,
    },
    Tail {
        limit: usize,
        upstream: Box<CompiledOp>,
    },
    Uniq {
        with_count: bool,
        upstream: Box<CompiledOp>,
    },
    Sort {
        keys: Vec<SortKeySpec>,
        upstream: Box<CompiledOp>,
    },
    GroupBy {
        keys: Vec<String>,
        aggs: Vec<AggSpec>,
        /// `Some(desc)` when the planner has proven the input already
        /// arrives sorted on this group-by's key prefix, enabling the
        /// streaming (bounded-memory) fast path.
        input_sort_dir: Option<bool>,
        /// `every D count() by X` sugar: present only before
        /// `zq_planner::replace_groupby_duration_with_key` lowers it into an
        /// explicit `ts` key and a preceding `Put` of `Time.trunc(ts, D)`.
        every: Option<EveryDuration>,
        upstream: Box<CompiledOp>,
    },
    /// Joins multiple independent branches, each its own subtree, by
    /// interleaving (`order_field: None`) or ordered k-way merge.
    Merge {
        order_field: Option<String>,
        order_desc: bool,
        branches: Vec<CompiledOp>,
    },
    /// The planner's `parallelizeFlowgraph` output: `branch` is compiled
    /// once per shard, each instance fed from a distinct partition of
    /// `upstream`'s output, then rejoined exactly like `Merge`.
    Parallel {
        upstream: Box<CompiledOp>,
        width: usize,
        branch: Box<CompiledOp>,
        order_field: Option<String>,
        order_desc: bool,
    },
    /// The leaf used inside a `Parallel` branch's template in place of a
    /// real `Source` — the compiler substitutes each shard's feed here.
    ShardInput,
    Pass {
        upstream: Box<CompiledOp>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_op_round_trips_through_json() {
        let ast = CompiledOp::Filter {
            pred: PredSpec::Compare {
                field: "x".into(),
                op: "gt".into(),
                literal: LiteralSpec::Int(1),
            },
            upstream: Box::new(CompiledOp::Source),
        };
        let json = serde_json::to_string(&ast).unwrap();
        let back: CompiledOp = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, CompiledOp::Filter { .. }));
    }
}
