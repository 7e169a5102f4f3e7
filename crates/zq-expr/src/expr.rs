//! A small computed-value expression tree used by `put`'s right-hand
//! sides: field references, typed literals, and function calls. Kept
//! separate from [`compare::Literal`], which only ever appears as the
//! right-hand side of a comparison.

use crate::field::FieldPath;
use crate::function::lookup;
use zq_core::{Context, Value};

#[derive(Debug, Clone)]
pub enum Expr {
    Field(FieldPath),
    Literal(Value),
    Call(String, Vec<Expr>),
}

impl Expr {
    /// Evaluates against a record. Per the put operator's unset-on-error
    /// contract, a missing field or a function error yields `Value::nil()`
    /// rather than aborting the record.
    pub fn eval(&self, ctx: &Context, record: &Value) -> Value {
        match self {
            Expr::Field(path) => path.get(record).unwrap_or_else(Value::nil),
            Expr::Literal(v) => v.clone(),
            Expr::Call(name, args) => {
                let argvals: Vec<Value> = args.iter().map(|a| a.eval(ctx, record)).collect();
                match lookup(name) {
                    Some(f) => f(ctx, &argvals).unwrap_or_else(|_| Value::nil()),
                    None => Value::nil(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::Primitive;

    #[test]
    fn field_expr_reads_record() {
        let ctx = Context::new();
        let t = ctx.primitive(Primitive::Int64);
        let rec_ty = ctx
            .lookup_type_record(vec![zq_core::Column { name: "x".into(), ty: t.clone() }])
            .unwrap();
        let rec = Value::build_record(rec_ty, &[Value::parse(&t, "42").unwrap()]).unwrap();
        let expr = Expr::Field(FieldPath::parse("x"));
        let got = expr.eval(&ctx, &rec);
        assert_eq!(zq_core::primitive::decode_int(got.bytes_or_empty()).unwrap(), 42);
    }

    #[test]
    fn missing_field_evaluates_to_nil() {
        let ctx = Context::new();
        let t = ctx.primitive(Primitive::Int64);
        let rec_ty = ctx
            .lookup_type_record(vec![zq_core::Column { name: "x".into(), ty: t.clone() }])
            .unwrap();
        let rec = Value::build_record(rec_ty, &[Value::parse(&t, "1").unwrap()]).unwrap();
        let expr = Expr::Field(FieldPath::parse("nope"));
        assert!(expr.eval(&ctx, &rec).is_nil());
    }

    #[test]
    fn call_expr_invokes_registered_function() {
        let ctx = Context::new();
        let st = ctx.primitive(Primitive::String);
        let lit = Expr::Literal(Value::parse(&st, "HELLO").unwrap());
        let call = Expr::Call("String.toLower".into(), vec![lit]);
        let dummy_rec_ty = ctx.lookup_type_record(vec![]).unwrap();
        let dummy = Value::build_record(dummy_rec_ty, &[]).unwrap();
        let got = call.eval(&ctx, &dummy);
        assert_eq!(
            zq_core::primitive::decode_string(got.bytes_or_empty()).unwrap(),
            "hello"
        );
    }
}
