//! Conservative column-liveness analysis: which fields a pipeline actually
//! reads from its source, so a reader capable of projection pushdown can be
//! told to skip the rest.

use std::collections::HashSet;

use zq_driver::ast::{CompiledOp, ExprSpec, PredSpec};

/// The result of [`compute_columns`]: either a known, finite set of field
/// names, or the "give me everything" sentinel — returned whenever an
/// operator reads fields it can't enumerate ahead of time (a wildcard
/// expression, or a transform this analysis doesn't model).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Columns {
    Known(HashSet<String>),
    Unknown,
}

impl Columns {
    fn union(self, other: Columns) -> Columns {
        match (self, other) {
            (Columns::Known(mut a), Columns::Known(b)) => {
                a.extend(b);
                Columns::Known(a)
            }
            _ => Columns::Unknown,
        }
    }

    fn with(mut self, field: &str) -> Columns {
        if let Columns::Known(set) = &mut self {
            set.insert(field.to_string());
        }
        self
    }

    fn remove(mut self, field: &str) -> Columns {
        if let Columns::Known(set) = &mut self {
            set.remove(field);
        }
        self
    }
}

fn pred_fields(pred: &PredSpec, acc: Columns) -> Columns {
    match pred {
        PredSpec::Compare { field, .. } => acc.with(field),
        PredSpec::And(preds) | PredSpec::Or(preds) => preds.iter().fold(acc, |acc, p| pred_fields(p, acc)),
        PredSpec::Not(p) => pred_fields(p, acc),
    }
}

fn expr_fields(expr: &ExprSpec, acc: Columns) -> Columns {
    match expr {
        ExprSpec::Field { path } => acc.with(path),
        ExprSpec::Literal { .. } => acc,
        ExprSpec::Call { args, .. } => args.iter().fold(acc, |acc, a| expr_fields(a, acc)),
    }
}

/// Computes the columns a sequential pipeline reads from its source.
/// `needed_downstream` seeds the requirement the caller places on the
/// pipeline's own output (pass `Columns::Unknown` when the consumer's needs
/// aren't known, which is the conservative and usually correct default).
pub fn compute_columns(op: &CompiledOp, needed_downstream: Columns) -> Columns {
    match op {
        CompiledOp::Source | CompiledOp::ShardInput => needed_downstream,
        CompiledOp::Filter { pred, upstream } => {
            let needed = pred_fields(pred, needed_downstream);
            compute_columns(upstream, needed)
        }
        CompiledOp::Cut { fields, complement, upstream, .. } => {
            // A non-complement cut only ever forwards `fields`, so that's
            // exactly what upstream must supply, independent of what was
            // asked for below it. A complement cut keeps everything except
            // `fields`, which this analysis can't enumerate without the
            // record's full field set.
            let needed = if *complement {
                Columns::Unknown
            } else {
                Columns::Known(fields.iter().cloned().collect())
            };
            compute_columns(upstream, needed)
        }
        CompiledOp::Put { assignments, upstream } => {
            let mut needed = needed_downstream;
            for (name, expr) in assignments {
                needed = needed.remove(name);
                needed = expr_fields(expr, needed);
            }
            compute_columns(upstream, needed)
        }
        CompiledOp::Rename { renames, upstream } => {
            let mut needed = needed_downstream;
            if let Columns::Known(set) = &mut needed {
                for (from, to) in renames {
                    if set.remove(to) {
                        set.insert(from.clone());
                    }
                }
            }
            compute_columns(upstream, needed)
        }
        CompiledOp::Head { upstream, .. } | CompiledOp::Tail { upstream, .. } | CompiledOp::Pass { upstream } => {
            compute_columns(upstream, needed_downstream)
        }
        // Uniq compares whole records (see the raw-bytes-equality design
        // decision), so it needs everything upstream has to offer.
        CompiledOp::Uniq { upstream, .. } => compute_columns(upstream, Columns::Unknown),
        CompiledOp::Sort { keys, upstream } => {
            let needed = keys.iter().fold(needed_downstream, |acc, k| acc.with(&k.field));
            compute_columns(upstream, needed)
        }
        // Group-by fully reshapes the record: whatever the caller needed
        // from *this* operator's output is irrelevant to what it needs
        // from upstream, which is exactly its keys and reducer inputs.
        CompiledOp::GroupBy { keys, aggs, every, upstream, .. } => {
            let mut needed = Columns::Known(keys.iter().cloned().collect());
            for agg in aggs {
                if let (Columns::Known(set), Some(input)) = (&mut needed, &agg.input) {
                    set.insert(input.clone());
                }
            }
            if let (Columns::Known(set), Some(every)) = (&mut needed, every) {
                set.insert(every.ts_field.clone());
            }
            compute_columns(upstream, needed)
        }
        CompiledOp::Merge { order_field, branches, .. } => {
            let seeded =
                order_field.as_ref().map(|f| needed_downstream.clone().with(f)).unwrap_or(needed_downstream);
            branches
                .iter()
                .map(|b| compute_columns(b, seeded.clone()))
                .fold(Columns::Known(HashSet::new()), Columns::union)
        }
        CompiledOp::Parallel { upstream, branch, order_field, .. } => {
            let seeded =
                order_field.as_ref().map(|f| needed_downstream.clone().with(f)).unwrap_or(needed_downstream);
            let from_branch = compute_columns(branch, seeded);
            compute_columns(upstream, from_branch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_pins_the_needed_set_to_its_own_fields() {
        let ast = CompiledOp::Cut {
            fields: vec!["a".into(), "b".into()],
            complement: false,
            strict: false,
            upstream: Box::new(CompiledOp::Source),
        };
        assert_eq!(
            compute_columns(&ast, Columns::Unknown),
            Columns::Known(["a".to_string(), "b".to_string()].into_iter().collect())
        );
    }

    #[test]
    fn filter_adds_its_field_to_an_already_known_set() {
        let ast = CompiledOp::Filter {
            pred: PredSpec::Compare {
                field: "status".into(),
                op: "eql".into(),
                literal: zq_driver::ast::LiteralSpec::Int(200),
            },
            upstream: Box::new(CompiledOp::Cut {
                fields: vec!["a".into()],
                complement: false,
                strict: false,
                upstream: Box::new(CompiledOp::Source),
            }),
        };
        let got = compute_columns(&ast, Columns::Unknown);
        assert_eq!(got, Columns::Known(["a".to_string(), "status".to_string()].into_iter().collect()));
    }

    #[test]
    fn complement_cut_is_unknown() {
        let ast = CompiledOp::Cut {
            fields: vec!["a".into()],
            complement: true,
            strict: false,
            upstream: Box::new(CompiledOp::Source),
        };
        assert_eq!(compute_columns(&ast, Columns::Unknown), Columns::Unknown);
    }
}
