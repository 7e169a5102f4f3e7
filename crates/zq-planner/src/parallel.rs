//! Duplicates the longest stateless prefix of a pipeline across `N`
//! branches so it can run concurrently, rejoining the branches through the
//! `Merge` they already require.

use zq_driver::ast::CompiledOp;

/// One collected prefix node, stripped of its own `upstream` link so it can
/// be re-rooted either at `ShardInput` (for the branch template) or at the
/// reconstructed `Source` (if parallelization turns out to be a no-op).
enum Shell {
    Filter(zq_driver::ast::PredSpec),
    Cut { fields: Vec<String>, complement: bool, strict: bool },
    Put(Vec<(String, zq_driver::ast::ExprSpec)>),
    Rename(Vec<(String, String)>),
    Head(usize),
    Tail(usize),
}

impl Shell {
    fn rebuild(self, upstream: CompiledOp) -> CompiledOp {
        let upstream = Box::new(upstream);
        match self {
            Shell::Filter(pred) => CompiledOp::Filter { pred, upstream },
            Shell::Cut { fields, complement, strict } => CompiledOp::Cut { fields, complement, strict, upstream },
            Shell::Put(assignments) => CompiledOp::Put { assignments, upstream },
            Shell::Rename(renames) => CompiledOp::Rename { renames, upstream },
            Shell::Head(limit) => CompiledOp::Head { limit, upstream },
            Shell::Tail(limit) => CompiledOp::Tail { limit, upstream },
        }
    }
}

/// Peels the longest run of stateless operators immediately above the
/// source (or a `Merge`/`Parallel` boundary, which this pass treats as
/// opaque and never looks inside) into `Shell`s, returning what remains of
/// the tree with that run's position left as a bare `CompiledOp::Source`
/// placeholder, plus the shells in nearest-source-first order.
fn split_prefix(op: CompiledOp) -> (CompiledOp, Vec<Shell>) {
    match op {
        CompiledOp::Source => (CompiledOp::Source, Vec::new()),
        CompiledOp::Filter { pred, upstream } => extend_if_still_at_boundary(*upstream, Shell::Filter(pred)),
        CompiledOp::Cut { fields, complement, strict, upstream } => {
            extend_if_still_at_boundary(*upstream, Shell::Cut { fields, complement, strict })
        }
        CompiledOp::Put { assignments, upstream } => extend_if_still_at_boundary(*upstream, Shell::Put(assignments)),
        CompiledOp::Rename { renames, upstream } => extend_if_still_at_boundary(*upstream, Shell::Rename(renames)),
        CompiledOp::Head { limit, upstream } => extend_if_still_at_boundary(*upstream, Shell::Head(limit)),
        CompiledOp::Tail { limit, upstream } => extend_if_still_at_boundary(*upstream, Shell::Tail(limit)),
        other => (other, Vec::new()),
    }
}

/// Recurses into `upstream` first; if the recursion bottomed out exactly at
/// the source (i.e. every node seen so far has been stateless), this node
/// is too, so it joins the shell list. Otherwise a non-stateless node was
/// already hit further down, and this node belongs to the remainder.
fn extend_if_still_at_boundary(upstream: CompiledOp, shell: Shell) -> (CompiledOp, Vec<Shell>) {
    let (remainder, mut shells) = split_prefix(upstream);
    if matches!(remainder, CompiledOp::Source) {
        shells.push(shell);
        (CompiledOp::Source, shells)
    } else {
        (shell.rebuild(remainder), shells)
    }
}

fn replace_source_leaf(op: CompiledOp, replacement: &CompiledOp) -> CompiledOp {
    crate::every::map_upstream(op, |up| {
        if matches!(up, CompiledOp::Source) {
            replacement.clone()
        } else {
            replace_source_leaf(up, replacement)
        }
    })
}

/// Finds the longest duplicable prefix of `op` and wraps it in a `Parallel`
/// of `width` branches rejoined via the `Merge` that `Parallel` already
/// performs internally, using `order_field`/`keep_order` as the rejoin
/// comparator. A boundary coinciding with a group-by never arises here,
/// since group-by was never eligible for the prefix in the first place. If
/// the prefix consumed the entire pipeline, a trailing `Pass` is appended
/// so there's still something above the fan-out to merge into.
pub fn parallelize_flowgraph(
    op: CompiledOp,
    width: usize,
    order_field: Option<String>,
    keep_order: bool,
) -> CompiledOp {
    let (remainder, shells) = split_prefix(op);
    if shells.is_empty() {
        tracing::debug!("no stateless prefix found; parallelize_flowgraph is a no-op");
        return remainder;
    }
    let branch = shells.into_iter().fold(CompiledOp::ShardInput, |acc, shell| shell.rebuild(acc));
    let parallel = CompiledOp::Parallel {
        upstream: Box::new(CompiledOp::Source),
        width,
        branch: Box::new(branch),
        order_field: order_field.clone(),
        order_desc: order_field.is_some() && !keep_order,
    };
    if matches!(remainder, CompiledOp::Source) {
        CompiledOp::Pass { upstream: Box::new(parallel) }
    } else {
        replace_source_leaf(remainder, &parallel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stateless_chain() -> CompiledOp {
        CompiledOp::Filter {
            pred: zq_driver::ast::PredSpec::Compare {
                field: "x".into(),
                op: "gt".into(),
                literal: zq_driver::ast::LiteralSpec::Int(0),
            },
            upstream: Box::new(CompiledOp::Cut {
                fields: vec!["x".into()],
                complement: false,
                strict: false,
                upstream: Box::new(CompiledOp::Source),
            }),
        }
    }

    #[test]
    fn duplicates_a_pure_stateless_chain_and_appends_pass() {
        let out = parallelize_flowgraph(stateless_chain(), 4, None, true);
        match out {
            CompiledOp::Pass { upstream } => match *upstream {
                CompiledOp::Parallel { width, branch, .. } => {
                    assert_eq!(width, 4);
                    assert!(matches!(*branch, CompiledOp::Filter { .. }));
                }
                _ => panic!("expected Parallel under Pass"),
            },
            _ => panic!("expected Pass at the root"),
        }
    }

    #[test]
    fn stops_at_a_stateful_boundary_and_splices_parallel_in_place() {
        let ast = CompiledOp::Sort { keys: vec![], upstream: Box::new(stateless_chain()) };
        let out = parallelize_flowgraph(ast, 2, Some("x".into()), true);
        match out {
            CompiledOp::Sort { upstream, .. } => match *upstream {
                CompiledOp::Parallel { width, order_field, .. } => {
                    assert_eq!(width, 2);
                    assert_eq!(order_field.as_deref(), Some("x"));
                }
                _ => panic!("expected Parallel under Sort"),
            },
            _ => panic!("expected the Sort node to remain the root"),
        }
    }

    #[test]
    fn a_stateful_root_with_no_stateless_prefix_is_left_untouched() {
        let ast = CompiledOp::Sort { keys: vec![], upstream: Box::new(CompiledOp::Source) };
        let out = parallelize_flowgraph(ast, 3, None, true);
        assert!(matches!(out, CompiledOp::Sort { .. }));
    }
}
