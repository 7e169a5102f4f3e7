//! Lowers the `every D` sugar on a group-by into an explicit `ts` key
//! computed by a `Put` ahead of it, per `Time.trunc`.

use zq_driver::ast::{AggSpec, CompiledOp, ExprSpec, LiteralSpec};

const BUCKET_FIELD: &str = "ts";

/// Walks `op`, replacing every `GroupBy { every: Some(_), .. }` with a `Put`
/// computing `ts = Time.trunc(<ts_field>, <duration>)` followed by a
/// `GroupBy` whose keys lead with `ts` and whose `every` is cleared.
pub fn replace_groupby_duration_with_key(op: CompiledOp) -> CompiledOp {
    match op {
        CompiledOp::GroupBy { keys, aggs, input_sort_dir, every: Some(every), upstream } => {
            let upstream = replace_groupby_duration_with_key(*upstream);
            tracing::debug!(ts_field = %every.ts_field, duration = %every.duration, "lowering every-duration group-by key");
            let put = CompiledOp::Put {
                assignments: vec![(
                    BUCKET_FIELD.to_string(),
                    ExprSpec::Call {
                        name: "Time.trunc".to_string(),
                        args: vec![
                            ExprSpec::Field { path: every.ts_field.clone() },
                            ExprSpec::Literal { value: LiteralSpec::String(every.duration.clone()) },
                        ],
                    },
                )],
                upstream: Box::new(upstream),
            };
            let mut lowered_keys = vec![BUCKET_FIELD.to_string()];
            lowered_keys.extend(keys);
            CompiledOp::GroupBy {
                keys: lowered_keys,
                aggs: dedup_count(aggs),
                input_sort_dir,
                every: None,
                upstream: Box::new(put),
            }
        }
        other => map_upstream(other, replace_groupby_duration_with_key),
    }
}

/// `every D count() by X` always implies a `count()` reducer; if the
/// caller's `aggs` didn't already name one, add it so the lowered form
/// matches `count() by ts=Time.trunc(ts, D), X` literally.
fn dedup_count(aggs: Vec<AggSpec>) -> Vec<AggSpec> {
    if aggs.iter().any(|a| a.kind == "count") {
        aggs
    } else {
        let mut aggs = aggs;
        aggs.push(AggSpec { name: "count".to_string(), kind: "count".to_string(), input: None });
        aggs
    }
}

/// Applies `f` to every single-upstream child of `op`, leaving the node
/// itself untouched; used by rewrites that only act on one variant.
pub(crate) fn map_upstream(op: CompiledOp, f: impl Fn(CompiledOp) -> CompiledOp) -> CompiledOp {
    match op {
        CompiledOp::Source | CompiledOp::ShardInput => op,
        CompiledOp::Filter { pred, upstream } => CompiledOp::Filter { pred, upstream: Box::new(f(*upstream)) },
        CompiledOp::Cut { fields, complement, strict, upstream } => {
            CompiledOp::Cut { fields, complement, strict, upstream: Box::new(f(*upstream)) }
        }
        CompiledOp::Put { assignments, upstream } => CompiledOp::Put { assignments, upstream: Box::new(f(*upstream)) },
        CompiledOp::Rename { renames, upstream } => CompiledOp::Rename { renames, upstream: Box::new(f(*upstream)) },
        CompiledOp::Head { limit, upstream } => CompiledOp::Head { limit, upstream: Box::new(f(*upstream)) },
        CompiledOp::Tail { limit, upstream } => CompiledOp::Tail { limit, upstream: Box::new(f(*upstream)) },
        CompiledOp::Uniq { with_count, upstream } => CompiledOp::Uniq { with_count, upstream: Box::new(f(*upstream)) },
        CompiledOp::Sort { keys, upstream } => CompiledOp::Sort { keys, upstream: Box::new(f(*upstream)) },
        CompiledOp::GroupBy { keys, aggs, input_sort_dir, every, upstream } => {
            CompiledOp::GroupBy { keys, aggs, input_sort_dir, every, upstream: Box::new(f(*upstream)) }
        }
        CompiledOp::Merge { order_field, order_desc, branches } => {
            CompiledOp::Merge { order_field, order_desc, branches: branches.into_iter().map(f).collect() }
        }
        CompiledOp::Parallel { upstream, width, branch, order_field, order_desc } => CompiledOp::Parallel {
            upstream: Box::new(f(*upstream)),
            width,
            branch,
            order_field,
            order_desc,
        },
        CompiledOp::Pass { upstream } => CompiledOp::Pass { upstream: Box::new(f(*upstream)) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_driver::ast::EveryDuration;

    #[test]
    fn lowers_every_into_ts_key_and_put() {
        let ast = CompiledOp::GroupBy {
            keys: vec!["host".into()],
            aggs: vec![],
            input_sort_dir: None,
            every: Some(EveryDuration { ts_field: "ts".into(), duration: "1h".into() }),
            upstream: Box::new(CompiledOp::Source),
        };
        let lowered = replace_groupby_duration_with_key(ast);
        match lowered {
            CompiledOp::GroupBy { keys, aggs, every, upstream, .. } => {
                assert_eq!(keys, vec!["ts".to_string(), "host".to_string()]);
                assert!(every.is_none());
                assert!(aggs.iter().any(|a| a.kind == "count"));
                assert!(matches!(*upstream, CompiledOp::Put { .. }));
            }
            _ => panic!("expected GroupBy"),
        }
    }
}
