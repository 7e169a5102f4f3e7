//! Multi-key record comparators shared by `sort` and `group-by`.

use std::cmp::Ordering;
use std::sync::Arc;
use zq_core::Value;
use zq_expr::FieldPath;

pub type CmpFn = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// Builds a comparator over an ordered list of `(key, descending)` pairs.
/// A record missing a key sorts before one that has it present, matching
/// `zq_core::compare`'s unset-before-present convention.
pub fn build_comparator(keys: Vec<(FieldPath, bool)>) -> CmpFn {
    Arc::new(move |a: &Value, b: &Value| {
        for (key, desc) in &keys {
            let av = key.get(a);
            let bv = key.get(b);
            let ord = match (av, bv) {
                (Some(av), Some(bv)) => zq_core::compare(&av, &bv),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ord = if *desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    })
}

/// Wraps a `CmpFn` as a `zq_stream::SortFn` for use with `Combiner`.
pub fn as_sort_fn(cmp: CmpFn) -> zq_stream::SortFn {
    Box::new(move |a, b| cmp(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::{Column, Context, Primitive};

    #[test]
    fn orders_by_single_ascending_key() {
        let ctx = Context::new();
        let t = ctx.primitive(Primitive::Int64);
        let ty = ctx.lookup_type_record(vec![Column { name: "k".into(), ty: t.clone() }]).unwrap();
        let a = Value::build_record(ty.clone(), &[Value::parse(&t, "1").unwrap()]).unwrap();
        let b = Value::build_record(ty.clone(), &[Value::parse(&t, "2").unwrap()]).unwrap();
        let cmp = build_comparator(vec![(FieldPath::parse("k"), false)]);
        assert_eq!(cmp(&a, &b), Ordering::Less);
        let cmp_desc = build_comparator(vec![(FieldPath::parse("k"), true)]);
        assert_eq!(cmp_desc(&a, &b), Ordering::Greater);
    }
}
