//! Boolean combinators over field predicates: and/or/not plus the wildcard
//! match used by bare-word search terms.

use crate::compare::Predicate;
use zq_core::Value;

pub fn and(preds: Vec<Predicate>) -> Predicate {
    Box::new(move |v: &Value| preds.iter().all(|p| p(v)))
}

pub fn or(preds: Vec<Predicate>) -> Predicate {
    Box::new(move |v: &Value| preds.iter().any(|p| p(v)))
}

pub fn not(pred: Predicate) -> Predicate {
    Box::new(move |v: &Value| !pred(v))
}

/// Translates a glob-style wildcard pattern (`*` and `?`) into an anchored
/// regex, the same expansion `zql`'s bare-word search performs before
/// handing off to `CompareRegexp`.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{compare_int64, Op};
    use zq_core::{Context, Primitive};

    fn iv(ctx: &Context, v: i64) -> Value {
        let t = ctx.primitive(Primitive::Int64);
        Value::parse(&t, &v.to_string()).unwrap()
    }

    #[test]
    fn and_requires_all() {
        let ctx = Context::new();
        let v = iv(&ctx, 5);
        let gt0 = compare_int64(Op::Gt, 0).unwrap();
        let lt10 = compare_int64(Op::Lt, 10).unwrap();
        let combined = and(vec![gt0, lt10]);
        assert!(combined(&v));
    }

    #[test]
    fn or_requires_one() {
        let ctx = Context::new();
        let v = iv(&ctx, 5);
        let eq1 = compare_int64(Op::Eql, 1).unwrap();
        let eq5 = compare_int64(Op::Eql, 5).unwrap();
        assert!(or(vec![eq1, eq5])(&v));
    }

    #[test]
    fn wildcard_expands_star_and_question() {
        assert_eq!(wildcard_to_regex("foo*bar?"), "^foo.*bar.$");
    }
}
