//! Coercion-rule comparisons: comparing a typed [`Value`] against a literal
//! of a possibly different primitive kind, each kind choosing its own
//! coercion rule. Grounded on `original_source/zx/compare.go`.

use crate::error::{ExprError, Result};
use ipnetwork::IpNetwork;
use regex::Regex;
use std::net::IpAddr;
use zq_core::primitive as prim;
use zq_core::{Context, Primitive, TypeKind, Value};

/// A boolean test applied to a single value.
pub type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eql,
    Neql,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring containment, meaningful only for strings.
    Search,
}

impl Op {
    pub fn parse(s: &str) -> Result<Op> {
        match s {
            "eql" | "==" => Ok(Op::Eql),
            "neql" | "!=" => Ok(Op::Neql),
            "gt" | ">" => Ok(Op::Gt),
            "gte" | ">=" => Ok(Op::Gte),
            "lt" | "<" => Ok(Op::Lt),
            "lte" | "<=" => Ok(Op::Lte),
            "search" => Ok(Op::Search),
            other => Err(ExprError::UnknownComparator(other.to_string())),
        }
    }

    fn apply<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            Op::Eql => a == b,
            Op::Neql => a != b,
            Op::Gt => a > b,
            Op::Gte => a >= b,
            Op::Lt => a < b,
            Op::Lte => a <= b,
            Op::Search => false,
        }
    }
}

/// A parsed literal pattern to compare field values against. Mirrors the
/// dispatch in `zx.Comparison`: the op plus a value of one of these kinds
/// determines which coercion rule is used.
#[derive(Debug, Clone)]
pub enum Literal {
    Unset,
    Regexp(String),
    Bool(bool),
    Float(f64),
    String(String),
    Port(u16),
    Int(i64),
    Ip(IpAddr),
    Net(IpNetwork),
}

fn type_is(ty: &zq_core::Type, p: Primitive) -> bool {
    matches!(Context::aliased(ty).kind(), TypeKind::Primitive(q) if *q == p)
}

pub fn compare_unset(op: Op) -> Result<Predicate> {
    match op {
        Op::Eql => Ok(Box::new(|v: &Value| v.is_unset())),
        Op::Neql => Ok(Box::new(|v: &Value| !v.is_unset())),
        _ => Err(ExprError::UnknownComparator(format!("{op:?} for unset"))),
    }
}

pub fn compare_bool(op: Op, pattern: bool) -> Result<Predicate> {
    Ok(Box::new(move |v: &Value| {
        let (Some(ty), Some(bytes)) = (v.ty.as_ref(), v.bytes.as_deref()) else {
            return false;
        };
        if !type_is(ty, Primitive::Bool) {
            return false;
        }
        let Ok(b) = prim::decode_bool(bytes) else { return false };
        match op {
            Op::Eql => b == pattern,
            Op::Neql => b != pattern,
            Op::Gt => b && !pattern,
            Op::Gte => b || !pattern,
            Op::Lt => !b && pattern,
            Op::Lte => !b || pattern,
            Op::Search => false,
        }
    }))
}

/// Compares integer-y fields (Int*, Uint*, Port, Duration, Time) against an
/// integer literal, widening each to i64 the way the original widens to
/// int64/float64 depending on field kind.
pub fn compare_int64(op: Op, pattern: i64) -> Result<Predicate> {
    Ok(Box::new(move |v: &Value| {
        let (Some(ty), Some(bytes)) = (v.ty.as_ref(), v.bytes.as_deref()) else {
            return false;
        };
        let aliased = Context::aliased(ty);
        let TypeKind::Primitive(p) = aliased.kind() else { return false };
        let widened: Option<i64> = match p {
            Primitive::Int8
            | Primitive::Int16
            | Primitive::Int32
            | Primitive::Int64 => prim::decode_int(bytes).ok(),
            Primitive::Uint8 | Primitive::Uint16 | Primitive::Uint32 | Primitive::Uint64 => {
                prim::decode_uint(bytes).ok().map(|u| u as i64)
            }
            Primitive::Port => prim::decode_port(bytes).ok().map(|p| p as i64),
            // Time/Duration store nanoseconds; an integer literal is in
            // whole seconds, so scale it up to nanoseconds to compare.
            Primitive::Time | Primitive::Duration => {
                return prim::decode_int(bytes)
                    .map(|ns| op.apply(ns, pattern * 1_000_000_000))
                    .unwrap_or(false)
            }
            Primitive::Float64 => {
                return prim::decode_f64(bytes)
                    .map(|f| op.apply(f, pattern as f64))
                    .unwrap_or(false)
            }
            _ => None,
        };
        widened.map(|w| op.apply(w, pattern)).unwrap_or(false)
    }))
}

pub fn compare_float64(op: Op, pattern: f64) -> Result<Predicate> {
    Ok(Box::new(move |v: &Value| {
        let (Some(ty), Some(bytes)) = (v.ty.as_ref(), v.bytes.as_deref()) else {
            return false;
        };
        let aliased = Context::aliased(ty);
        let TypeKind::Primitive(p) = aliased.kind() else { return false };
        let widened: Option<f64> = match p {
            Primitive::Float64 => prim::decode_f64(bytes).ok(),
            Primitive::Int8 | Primitive::Int16 | Primitive::Int32 | Primitive::Int64 => {
                prim::decode_int(bytes).ok().map(|i| i as f64)
            }
            Primitive::Uint8 | Primitive::Uint16 | Primitive::Uint32 | Primitive::Uint64 => {
                prim::decode_uint(bytes).ok().map(|u| u as f64)
            }
            Primitive::Port => prim::decode_port(bytes).ok().map(|p| p as f64),
            Primitive::Time | Primitive::Duration => {
                prim::decode_int(bytes).ok().map(|ns| ns as f64 / 1e9)
            }
            _ => None,
        };
        widened.map(|w| op.apply(w, pattern)).unwrap_or(false)
    }))
}

pub fn compare_string(op: Op, pattern: String) -> Result<Predicate> {
    Ok(Box::new(move |v: &Value| {
        let (Some(ty), Some(bytes)) = (v.ty.as_ref(), v.bytes.as_deref()) else {
            return false;
        };
        if !type_is(ty, Primitive::String) && !type_is(ty, Primitive::Bytes) {
            return false;
        }
        let Ok(s) = prim::decode_string(bytes) else { return false };
        match op {
            Op::Search => s.contains(pattern.as_str()),
            _ => op.apply(s.as_str(), pattern.as_str()),
        }
    }))
}

pub fn compare_regexp(op: Op, pattern: &str) -> Result<Predicate> {
    let re = Regex::new(pattern)?;
    match op {
        Op::Eql => Ok(Box::new(move |v: &Value| {
            let (Some(ty), Some(bytes)) = (v.ty.as_ref(), v.bytes.as_deref()) else {
                return false;
            };
            if !type_is(ty, Primitive::String) && !type_is(ty, Primitive::Bytes) {
                return false;
            }
            prim::decode_string(bytes).map(|s| re.is_match(&s)).unwrap_or(false)
        })),
        Op::Neql => Ok(Box::new(move |v: &Value| {
            let (Some(ty), Some(bytes)) = (v.ty.as_ref(), v.bytes.as_deref()) else {
                return false;
            };
            if !type_is(ty, Primitive::String) && !type_is(ty, Primitive::Bytes) {
                return false;
            }
            !prim::decode_string(bytes).map(|s| re.is_match(&s)).unwrap_or(false)
        })),
        other => Err(ExprError::UnknownComparator(format!("{other:?} for regexp"))),
    }
}

pub fn compare_port(op: Op, pattern: u16) -> Result<Predicate> {
    Ok(Box::new(move |v: &Value| {
        let (Some(ty), Some(bytes)) = (v.ty.as_ref(), v.bytes.as_deref()) else {
            return false;
        };
        if !type_is(ty, Primitive::Port) {
            return false;
        }
        prim::decode_port(bytes)
            .map(|p| op.apply(p as i64, pattern as i64))
            .unwrap_or(false)
    }))
}

pub fn compare_ip(op: Op, pattern: IpAddr) -> Result<Predicate> {
    Ok(Box::new(move |v: &Value| {
        let (Some(ty), Some(bytes)) = (v.ty.as_ref(), v.bytes.as_deref()) else {
            return false;
        };
        if !type_is(ty, Primitive::Ip) {
            return false;
        }
        prim::decode_ip(bytes).map(|ip| op.apply(ip, pattern)).unwrap_or(false)
    }))
}

/// Matches addresses by CIDR containment and subnets by literal equality,
/// mirroring `CompareSubnet`'s dual `matchSubnet`/`compareSubnet` tables.
pub fn compare_net(op: Op, pattern: IpNetwork) -> Result<Predicate> {
    Ok(Box::new(move |v: &Value| {
        let (Some(ty), Some(bytes)) = (v.ty.as_ref(), v.bytes.as_deref()) else {
            return false;
        };
        if type_is(ty, Primitive::Ip) {
            let Ok(ip) = prim::decode_ip(bytes) else { return false };
            let contained = pattern.contains(ip);
            return match op {
                Op::Eql => contained,
                Op::Neql => !contained,
                _ => false,
            };
        }
        if type_is(ty, Primitive::Net) {
            let Ok(net) = prim::decode_net(bytes) else { return false };
            return match op {
                Op::Eql => net.ip() == pattern.ip(),
                Op::Neql => net.ip() != pattern.ip(),
                Op::Lt => net.ip() < pattern.ip(),
                Op::Lte => net.ip() <= pattern.ip(),
                Op::Gt => net.ip() > pattern.ip(),
                Op::Gte => net.ip() >= pattern.ip(),
                Op::Search => false,
            };
        }
        false
    }))
}

/// Builds the predicate for a literal pattern, dispatching to the coercion
/// rule for its kind. Mirrors `zx.Comparison`.
pub fn comparison(op: Op, literal: &Literal) -> Result<Predicate> {
    match literal {
        Literal::Unset => compare_unset(op),
        Literal::Regexp(pat) => compare_regexp(op, pat),
        Literal::Bool(b) => compare_bool(op, *b),
        Literal::Float(f) => compare_float64(op, *f),
        Literal::String(s) => compare_string(op, s.clone()),
        Literal::Port(p) => compare_port(op, *p),
        Literal::Int(i) => compare_int64(op, *i),
        Literal::Ip(ip) => compare_ip(op, *ip),
        Literal::Net(n) => compare_net(op, *n),
    }
}

/// Lifts an element predicate to an "in"-style containment test over array
/// and set values, mirroring `zx.Contains`.
pub fn contains(elem: Predicate) -> Predicate {
    Box::new(move |v: &Value| {
        let Ok(elements) = v.array_elements() else { return false };
        elements.iter().any(|e| elem(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(ctx: &Context, v: i64) -> Value {
        let t = ctx.primitive(Primitive::Int64);
        Value::parse(&t, &v.to_string()).unwrap()
    }

    #[test]
    fn int_pattern_coerces_into_float_field() {
        let ctx = Context::new();
        let t = ctx.primitive(Primitive::Float64);
        let v = Value::parse(&t, "3.0").unwrap();
        let pred = compare_int64(Op::Eql, 3).unwrap();
        assert!(pred(&v));
    }

    #[test]
    fn string_eq_and_search() {
        let ctx = Context::new();
        let t = ctx.primitive(Primitive::String);
        let v = Value::parse(&t, "hello world").unwrap();
        assert!(compare_string(Op::Eql, "hello world".into()).unwrap()(&v));
        assert!(compare_string(Op::Search, "lo wo".into()).unwrap()(&v));
        assert!(!compare_string(Op::Search, "nope".into()).unwrap()(&v));
    }

    #[test]
    fn unset_predicate() {
        let ctx = Context::new();
        let t = ctx.primitive(Primitive::Int64);
        let unset = Value::unset(t);
        assert!(compare_unset(Op::Eql).unwrap()(&unset));
        let present = iv(&ctx, 1);
        assert!(!compare_unset(Op::Eql).unwrap()(&present));
    }

    #[test]
    fn net_contains_ip() {
        let ctx = Context::new();
        let t = ctx.primitive(Primitive::Ip);
        let v = Value::parse(&t, "10.0.0.5").unwrap();
        let net: IpNetwork = "10.0.0.0/24".parse().unwrap();
        assert!(compare_net(Op::Eql, net).unwrap()(&v));
        let net2: IpNetwork = "10.0.1.0/24".parse().unwrap();
        assert!(!compare_net(Op::Eql, net2).unwrap()(&v));
    }
}
