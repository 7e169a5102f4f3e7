//! Built-in function registry used by `put` expressions. Grounded on the
//! `String.*`/`Math.*`/`Time.*` namespaces the pipeline's expression
//! language exposes (spec §4.3).

use crate::error::{ExprError, Result};
use zq_core::primitive as prim;
use zq_core::{Context, Primitive, TypeKind, Value};

pub type Function = fn(&Context, &[Value]) -> Result<Value>;

pub fn lookup(name: &str) -> Option<Function> {
    Some(match name {
        "String.replace" => string_replace,
        "String.toLower" => string_to_lower,
        "String.toUpper" => string_to_upper,
        "String.length" => string_length,
        "Math.max" => math_max,
        "Math.min" => math_min,
        "Math.abs" => math_abs,
        "Time.trunc" => time_trunc,
        "Time.now" => time_now,
        _ => return None,
    })
}

fn arg_string(name: &str, args: &[Value], i: usize) -> Result<String> {
    let v = args.get(i).ok_or_else(|| ExprError::Arity(name.into(), i + 1, args.len()))?;
    let bytes = v.bytes_or_empty();
    prim::decode_string(bytes).map_err(|_| ExprError::BadArgument(name.into()))
}

fn arg_int(name: &str, args: &[Value], i: usize) -> Result<i64> {
    let v = args.get(i).ok_or_else(|| ExprError::Arity(name.into(), i + 1, args.len()))?;
    let bytes = v.bytes_or_empty();
    let Some(ty) = v.ty.as_ref() else {
        return Err(ExprError::BadArgument(name.into()));
    };
    let aliased = Context::aliased(ty);
    match aliased.kind() {
        TypeKind::Primitive(Primitive::Float64) => {
            prim::decode_f64(bytes).map(|f| f as i64).map_err(|_| ExprError::BadArgument(name.into()))
        }
        _ => prim::decode_int(bytes).map_err(|_| ExprError::BadArgument(name.into())),
    }
}

fn arg_float(name: &str, args: &[Value], i: usize) -> Result<f64> {
    let v = args.get(i).ok_or_else(|| ExprError::Arity(name.into(), i + 1, args.len()))?;
    let bytes = v.bytes_or_empty();
    let Some(ty) = v.ty.as_ref() else {
        return Err(ExprError::BadArgument(name.into()));
    };
    let aliased = Context::aliased(ty);
    match aliased.kind() {
        TypeKind::Primitive(Primitive::Float64) => {
            prim::decode_f64(bytes).map_err(|_| ExprError::BadArgument(name.into()))
        }
        _ => prim::decode_int(bytes).map(|i| i as f64).map_err(|_| ExprError::BadArgument(name.into())),
    }
}

fn string_result(ctx: &Context, s: String) -> Value {
    let t = ctx.primitive(Primitive::String);
    Value::new(t, Some(s.into_bytes()))
}

fn int_result(ctx: &Context, v: i64) -> Value {
    let t = ctx.primitive(Primitive::Int64);
    Value::new(t, Some(prim::encode_int(v)))
}

fn float_result(ctx: &Context, v: f64) -> Value {
    let t = ctx.primitive(Primitive::Float64);
    Value::new(t, Some(v.to_le_bytes().to_vec()))
}

fn string_replace(ctx: &Context, args: &[Value]) -> Result<Value> {
    if args.len() != 3 {
        return Err(ExprError::Arity("String.replace".into(), 3, args.len()));
    }
    let s = arg_string("String.replace", args, 0)?;
    let from = arg_string("String.replace", args, 1)?;
    let to = arg_string("String.replace", args, 2)?;
    Ok(string_result(ctx, s.replace(&from, &to)))
}

fn string_to_lower(ctx: &Context, args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(ExprError::Arity("String.toLower".into(), 1, args.len()));
    }
    Ok(string_result(ctx, arg_string("String.toLower", args, 0)?.to_lowercase()))
}

fn string_to_upper(ctx: &Context, args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(ExprError::Arity("String.toUpper".into(), 1, args.len()));
    }
    Ok(string_result(ctx, arg_string("String.toUpper", args, 0)?.to_uppercase()))
}

fn string_length(ctx: &Context, args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(ExprError::Arity("String.length".into(), 1, args.len()));
    }
    let s = arg_string("String.length", args, 0)?;
    Ok(int_result(ctx, s.chars().count() as i64))
}

fn math_max(ctx: &Context, args: &[Value]) -> Result<Value> {
    if args.is_empty() {
        return Err(ExprError::Arity("Math.max".into(), 1, 0));
    }
    let mut best = arg_float("Math.max", args, 0)?;
    for i in 1..args.len() {
        best = best.max(arg_float("Math.max", args, i)?);
    }
    Ok(float_result(ctx, best))
}

fn math_min(ctx: &Context, args: &[Value]) -> Result<Value> {
    if args.is_empty() {
        return Err(ExprError::Arity("Math.min".into(), 1, 0));
    }
    let mut best = arg_float("Math.min", args, 0)?;
    for i in 1..args.len() {
        best = best.min(arg_float("Math.min", args, i)?);
    }
    Ok(float_result(ctx, best))
}

fn math_abs(ctx: &Context, args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(ExprError::Arity("Math.abs".into(), 1, args.len()));
    }
    let v = args.get(0).unwrap();
    let Some(ty) = v.ty.as_ref() else {
        return Err(ExprError::BadArgument("Math.abs".into()));
    };
    let aliased = Context::aliased(ty);
    match aliased.kind() {
        TypeKind::Primitive(Primitive::Float64) => {
            Ok(float_result(ctx, arg_float("Math.abs", args, 0)?.abs()))
        }
        _ => Ok(int_result(ctx, arg_int("Math.abs", args, 0)?.abs())),
    }
}

/// Truncates a time value down to the nearest multiple of a duration given
/// in nanoseconds, used for bucketing (`Time.trunc(ts, 1_000_000_000)`).
fn time_trunc(ctx: &Context, args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(ExprError::Arity("Time.trunc".into(), 2, args.len()));
    }
    let ts = arg_int("Time.trunc", args, 0)?;
    let bucket = arg_int("Time.trunc", args, 1)?;
    if bucket <= 0 {
        return Err(ExprError::BadArgument("Time.trunc".into()));
    }
    let truncated = ts - ts.rem_euclid(bucket);
    let t = ctx.primitive(Primitive::Time);
    Ok(Value::new(t, Some(prim::encode_int(truncated))))
}

fn time_now(ctx: &Context, args: &[Value]) -> Result<Value> {
    if !args.is_empty() {
        return Err(ExprError::Arity("Time.now".into(), 0, args.len()));
    }
    let ns = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    let t = ctx.primitive(Primitive::Time);
    Ok(Value::new(t, Some(prim::encode_int(ns))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_and_case_functions() {
        let ctx = Context::new();
        let s = string_result(&ctx, "Hello World".into());
        let f = lookup("String.toLower").unwrap();
        let lower = f(&ctx, &[s.clone()]).unwrap();
        assert_eq!(prim::decode_string(lower.bytes_or_empty()).unwrap(), "hello world");

        let from = string_result(&ctx, "World".into());
        let to = string_result(&ctx, "Rust".into());
        let replaced = lookup("String.replace").unwrap()(&ctx, &[s, from, to]).unwrap();
        assert_eq!(
            prim::decode_string(replaced.bytes_or_empty()).unwrap(),
            "Hello Rust"
        );
    }

    #[test]
    fn math_max_min_abs() {
        let ctx = Context::new();
        let a = int_result(&ctx, -5);
        let b = int_result(&ctx, 3);
        let max = lookup("Math.max").unwrap()(&ctx, &[a.clone(), b.clone()]).unwrap();
        assert_eq!(prim::decode_f64(max.bytes_or_empty()).unwrap(), 3.0);
        let abs = lookup("Math.abs").unwrap()(&ctx, &[a]).unwrap();
        assert_eq!(prim::decode_int(abs.bytes_or_empty()).unwrap(), 5);
    }

    #[test]
    fn time_trunc_buckets_to_multiple() {
        let ctx = Context::new();
        let t = ctx.primitive(Primitive::Time);
        let ts = Value::new(t, Some(prim::encode_int(1_500_000_000)));
        let bucket = int_result(&ctx, 1_000_000_000);
        let truncated = lookup("Time.trunc").unwrap()(&ctx, &[ts, bucket]).unwrap();
        assert_eq!(
            prim::decode_int(truncated.bytes_or_empty()).unwrap(),
            1_000_000_000
        );
    }

    #[test]
    fn unknown_function_is_none() {
        assert!(lookup("Nope.nope").is_none());
    }
}
