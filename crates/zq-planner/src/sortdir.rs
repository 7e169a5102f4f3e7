//! Propagates a known source sort order down into a group-by's
//! `input_sort_dir`, enabling the bounded-memory streaming path in
//! `zq_outofcore::GroupBy` whenever the data already arrives grouped.

use zq_driver::ast::CompiledOp;

/// Walks `op` from the source outward looking for the first group-by whose
/// leading key is `field` (directly, or via an unlowered `every` bucketing
/// `field`). If found, sets its `input_sort_dir`. Returns whether the
/// pipeline's output is still known to be sorted on `field` past that
/// point — `false` once an operator that can reorder or drop the field is
/// encountered.
pub fn set_groupby_input_sort_dir(op: &mut CompiledOp, field: &str, dir: bool) -> bool {
    match op {
        CompiledOp::Source | CompiledOp::ShardInput => true,
        CompiledOp::Filter { upstream, .. }
        | CompiledOp::Head { upstream, .. }
        | CompiledOp::Tail { upstream, .. }
        | CompiledOp::Pass { upstream } => set_groupby_input_sort_dir(upstream, field, dir),
        CompiledOp::Uniq { upstream, .. } => set_groupby_input_sort_dir(upstream, field, dir),
        CompiledOp::Cut { fields, complement, upstream, .. } => {
            let still_present = if *complement { !fields.iter().any(|f| f == field) } else { fields.iter().any(|f| f == field) };
            still_present && set_groupby_input_sort_dir(upstream, field, dir)
        }
        CompiledOp::Rename { renames, upstream, .. } => {
            if renames.iter().any(|(_, to)| to == field) {
                // `field` is itself the renamed-to name: the name the rest
                // of the pipeline sees changed, so order tracking for the
                // original name stops here.
                false
            } else {
                set_groupby_input_sort_dir(upstream, field, dir)
            }
        }
        CompiledOp::Put { assignments, upstream } => {
            if assignments.iter().any(|(name, _)| name == field) {
                false
            } else {
                set_groupby_input_sort_dir(upstream, field, dir)
            }
        }
        CompiledOp::Sort { keys, .. } => keys.first().is_some_and(|k| k.field == field && k.desc == !dir),
        CompiledOp::GroupBy { keys, every, input_sort_dir, upstream, .. } => {
            let leading_key_matches = keys.first().map(|k| k.as_str()) == Some(field)
                || every.as_ref().is_some_and(|e| e.ts_field == field);
            if leading_key_matches && set_groupby_input_sort_dir(upstream, field, dir) {
                *input_sort_dir = Some(dir);
                true
            } else {
                false
            }
        }
        CompiledOp::Merge { order_field, order_desc, .. } => {
            order_field.as_deref() == Some(field) && *order_desc == !dir
        }
        CompiledOp::Parallel { order_field, order_desc, .. } => {
            order_field.as_deref() == Some(field) && *order_desc == !dir
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_input_sort_dir_when_leading_key_matches_and_order_is_preserved() {
        let mut ast = CompiledOp::GroupBy {
            keys: vec!["ts".into()],
            aggs: vec![],
            input_sort_dir: None,
            every: None,
            upstream: Box::new(CompiledOp::Source),
        };
        assert!(set_groupby_input_sort_dir(&mut ast, "ts", false));
        match ast {
            CompiledOp::GroupBy { input_sort_dir, .. } => assert_eq!(input_sort_dir, Some(false)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn a_put_that_overwrites_the_field_breaks_the_chain() {
        let mut ast = CompiledOp::GroupBy {
            keys: vec!["ts".into()],
            aggs: vec![],
            input_sort_dir: None,
            every: None,
            upstream: Box::new(CompiledOp::Put {
                assignments: vec![("ts".into(), zq_driver::ast::ExprSpec::Literal { value: zq_driver::ast::LiteralSpec::Int(0) })],
                upstream: Box::new(CompiledOp::Source),
            }),
        };
        assert!(!set_groupby_input_sort_dir(&mut ast, "ts", false));
        match ast {
            CompiledOp::GroupBy { input_sort_dir, .. } => assert_eq!(input_sort_dir, None),
            _ => unreachable!(),
        }
    }
}
