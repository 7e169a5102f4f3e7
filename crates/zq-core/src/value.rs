//! The `(Type, Bytes)` value representation, preserving the three-way
//! nil / unset / empty-container distinction described in spec §3 and §9:
//! `bytes == None && ty == None` is nil, `bytes == None && ty == Some(_)` is
//! unset (typed absence), and `bytes == Some(vec![])` is a legitimate empty
//! container. Grounded on `original_source/zng/value.go`.

use crate::error::{Result, TypeError};
use crate::primitive::Primitive;
use crate::types::{Column, Context, Type, TypeKind};
use crate::zcode::{self, Bytes};
use std::cmp::Ordering;

#[derive(Debug, Clone)]
pub struct Value {
    pub ty: Option<Type>,
    pub bytes: Option<Bytes>,
}

impl Value {
    pub fn nil() -> Self {
        Value { ty: None, bytes: None }
    }

    pub fn unset(ty: Type) -> Self {
        Value { ty: Some(ty), bytes: None }
    }

    pub fn new(ty: Type, bytes: Bytes) -> Self {
        Value { ty: Some(ty), bytes: Some(bytes) }
    }

    pub fn is_nil(&self) -> bool {
        self.ty.is_none() && self.bytes.is_none()
    }

    /// Unset values are represented with `bytes == None` but a known type.
    /// A zero-valued present value is represented by `bytes == Some(vec![])`.
    pub fn is_unset(&self) -> bool {
        self.bytes.is_none() && self.ty.is_some()
    }

    pub fn is_unset_or_nil(&self) -> bool {
        self.bytes.is_none()
    }

    pub fn is_container(&self) -> bool {
        self.ty.as_ref().map(|t| t.is_container()).unwrap_or(false)
    }

    pub fn bytes_or_empty(&self) -> &[u8] {
        self.bytes.as_deref().unwrap_or(&[])
    }

    /// Append this value's contribution as a child of an enclosing
    /// container being assembled (record/array/set/union/map).
    pub fn encode_into(&self, dst: &mut Bytes) {
        zcode::append_value(dst, self.bytes.as_deref());
    }

    pub fn parse(ty: &Type, text: &str) -> Result<Value> {
        if text == "-" {
            return Ok(Value::unset(ty.clone()));
        }
        Ok(Value::new(ty.clone(), ty.parse(text)?))
    }

    pub fn format(&self, fmt: crate::escape::OutFmt) -> String {
        match (&self.ty, &self.bytes) {
            (Some(t), Some(b)) => t.string_of(b, fmt, false),
            _ => "-".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        match &self.ty {
            None => Ok(serde_json::Value::Null),
            Some(t) => t.marshal(self.bytes.as_deref()),
        }
    }

    /// Build a record value from the already-encoded field values, in
    /// column order. A field whose `Value` is nil (no type known) is an
    /// error; use `Value::unset` for a present-but-absent field.
    pub fn build_record(ty: Type, fields: &[Value]) -> Result<Value> {
        let rec = ty
            .as_record()
            .ok_or_else(|| TypeError::Mismatch { expected: "record".into(), found: ty.to_string() })?;
        if rec.columns.len() != fields.len() {
            return Err(TypeError::Other(format!(
                "record arity mismatch: type has {} columns, got {} values",
                rec.columns.len(),
                fields.len()
            )));
        }
        let mut out = Bytes::new();
        for f in fields {
            f.encode_into(&mut out);
        }
        Ok(Value::new(ty, out))
    }

    /// Build an array value from already-encoded elements.
    pub fn build_array(array_ty: Type, elements: &[Value]) -> Value {
        let mut out = Bytes::new();
        for e in elements {
            e.encode_into(&mut out);
        }
        Value::new(array_ty, out)
    }

    /// Build a set value, normalizing to sorted order by encoded bytes
    /// (spec §3: "serialized in sorted order by element encoding").
    pub fn build_set(set_ty: Type, mut elements: Vec<Value>) -> Value {
        elements.sort_by(|a, b| a.bytes_or_empty().cmp(b.bytes_or_empty()));
        elements.dedup_by(|a, b| a.bytes == b.bytes);
        let mut out = Bytes::new();
        for e in &elements {
            e.encode_into(&mut out);
        }
        Value::new(set_ty, out)
    }

    /// Iterate a record's field values (one level; nested records are
    /// returned as opaque container `Value`s for the caller to recurse
    /// into, matching `original_source/zng/fielditer.go`'s column walk).
    pub fn record_fields(&self) -> Result<Vec<(String, Value)>> {
        let Some(ty) = &self.ty else {
            return Err(TypeError::Mismatch { expected: "record".into(), found: "nil".into() });
        };
        let rec = ty
            .as_record()
            .ok_or_else(|| TypeError::Mismatch { expected: "record".into(), found: ty.to_string() })?;
        let Some(bytes) = &self.bytes else {
            return Ok(rec
                .columns
                .iter()
                .map(|c| (c.name.clone(), Value::unset(c.ty.clone())))
                .collect());
        };
        let mut out = Vec::with_capacity(rec.columns.len());
        let mut it = zcode::Iter::new(bytes);
        for col in &rec.columns {
            let child = it.next()?.unwrap_or(None);
            let v = match child {
                Some(b) => Value::new(col.ty.clone(), b.to_vec()),
                None => Value::unset(col.ty.clone()),
            };
            out.push((col.name.clone(), v));
        }
        Ok(out)
    }

    /// Look up a column by dotted path, descending through nested records.
    pub fn field_by_path(&self, path: &[&str]) -> Option<Value> {
        if path.is_empty() {
            return Some(self.clone());
        }
        let fields = self.record_fields().ok()?;
        let (_, v) = fields.into_iter().find(|(name, _)| name == path[0])?;
        v.field_by_path(&path[1..])
    }

    pub fn array_elements(&self) -> Result<Vec<Value>> {
        let Some(ty) = &self.ty else {
            return Err(TypeError::NotContainer);
        };
        let inner = ty
            .inner_type()
            .ok_or_else(|| TypeError::Mismatch { expected: "array or set".into(), found: ty.to_string() })?;
        let Some(bytes) = &self.bytes else {
            return Err(TypeError::LenUnset);
        };
        let mut out = Vec::new();
        let mut it = zcode::Iter::new(bytes);
        while let Some(child) = it.next()? {
            out.push(match child {
                Some(b) => Value::new(inner.clone(), b.to_vec()),
                None => Value::unset(inner.clone()),
            });
        }
        Ok(out)
    }

    pub fn container_len(&self) -> Result<usize> {
        match &self.ty {
            Some(t) if t.is_container() => {
                let Some(_bytes) = &self.bytes else {
                    return Err(TypeError::LenUnset);
                };
                Ok(self.array_elements().map(|v| v.len()).unwrap_or(0))
            }
            _ => Err(TypeError::NotContainer),
        }
    }
}

/// Build a record type + synthetic value for `{name: value, ...}`, creating
/// each column's type in `ctx` from the supplied values' own types.
pub fn record_of(ctx: &Context, fields: Vec<(&str, Value)>) -> Result<Value> {
    let columns: Vec<Column> = fields
        .iter()
        .map(|(name, v)| {
            Ok(Column {
                name: name.to_string(),
                ty: v
                    .ty
                    .clone()
                    .ok_or_else(|| TypeError::Other(format!("field {name:?} has no type")))?,
            })
        })
        .collect::<Result<_>>()?;
    let ty = ctx.lookup_type_record(columns)?;
    let values: Vec<Value> = fields.into_iter().map(|(_, v)| v).collect();
    Value::build_record(ty, &values)
}

/// General-purpose ordering over values, used by `sort` and group-by key
/// comparison. Same-type primitives compare numerically/lexically by kind;
/// values of different underlying kind (including unset/nil) are ordered
/// by a stable (kind, bytes) fallback so sort remains a total order without
/// requiring every pair to be semantically comparable.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (&a.ty, &b.ty) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(ta), Some(tb)) => {
            let aa = Context::aliased(ta);
            let ab = Context::aliased(tb);
            match (a.is_unset(), b.is_unset()) {
                (true, true) => Ordering::Equal,
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                (false, false) => {}
            }
            if let (TypeKind::Primitive(pa), TypeKind::Primitive(pb)) = (aa.kind(), ab.kind()) {
                if pa == pb {
                    return compare_same_primitive(*pa, a.bytes_or_empty(), b.bytes_or_empty());
                }
            }
            if aa.id() == ab.id() {
                return a.bytes_or_empty().cmp(b.bytes_or_empty());
            }
            aa.id().cmp(&ab.id())
        }
    }
}

fn compare_same_primitive(p: Primitive, a: &[u8], b: &[u8]) -> Ordering {
    use crate::primitive::{decode_f64, decode_int, decode_uint};
    match p {
        Primitive::Float64 => {
            let (av, bv) = (decode_f64(a), decode_f64(b));
            match (av, bv) {
                (Ok(av), Ok(bv)) => av.partial_cmp(&bv).unwrap_or(Ordering::Equal),
                _ => a.cmp(b),
            }
        }
        p if p.is_signed() || p == Primitive::Time || p == Primitive::Duration => {
            match (decode_int(a), decode_int(b)) {
                (Ok(av), Ok(bv)) => av.cmp(&bv),
                _ => a.cmp(b),
            }
        }
        p if p.is_integer() => match (decode_uint(a), decode_uint(b)) {
            (Ok(av), Ok(bv)) => av.cmp(&bv),
            _ => a.cmp(b),
        },
        Primitive::Port => match (decode_uint(a), decode_uint(b)) {
            (Ok(av), Ok(bv)) => av.cmp(&bv),
            _ => a.cmp(b),
        },
        Primitive::String => {
            let (av, bv) = (std::str::from_utf8(a), std::str::from_utf8(b));
            match (av, bv) {
                (Ok(av), Ok(bv)) => av.cmp(bv),
                _ => a.cmp(b),
            }
        }
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Context;

    #[test]
    fn nil_unset_empty_are_distinct() {
        let ctx = Context::new();
        let strt = ctx.primitive(Primitive::String);
        let nil = Value::nil();
        let unset = Value::unset(strt.clone());
        let empty = Value::new(strt, Vec::new());
        assert!(nil.is_nil());
        assert!(!nil.is_unset());
        assert!(unset.is_unset());
        assert!(!unset.is_nil());
        assert!(!empty.is_unset());
        assert!(!empty.is_nil());
        assert_eq!(empty.bytes_or_empty(), b"");
    }

    #[test]
    fn record_roundtrip_with_unset_field() {
        let ctx = Context::new();
        let i64t = ctx.primitive(Primitive::Int64);
        let strt = ctx.primitive(Primitive::String);
        let ty = ctx
            .lookup_type_record(vec![
                Column { name: "a".into(), ty: i64t.clone() },
                Column { name: "b".into(), ty: strt.clone() },
            ])
            .unwrap();
        let rec = Value::build_record(
            ty,
            &[Value::parse(&i64t, "42").unwrap(), Value::unset(strt)],
        )
        .unwrap();
        let fields = rec.record_fields().unwrap();
        assert_eq!(fields[0].0, "a");
        assert_eq!(fields[1].1.is_unset(), true);
        assert_eq!(fields[0].1.format(crate::escape::OutFmt::Primary), "42");
    }

    #[test]
    fn set_normalizes_sorted_and_dedups() {
        let ctx = Context::new();
        let i64t = ctx.primitive(Primitive::Int64);
        let set_ty = ctx.lookup_type_set(i64t.clone());
        let elems = vec![
            Value::parse(&i64t, "3").unwrap(),
            Value::parse(&i64t, "1").unwrap(),
            Value::parse(&i64t, "1").unwrap(),
            Value::parse(&i64t, "2").unwrap(),
        ];
        let set = Value::build_set(set_ty, elems);
        let out = set.array_elements().unwrap();
        let vals: Vec<i64> = out
            .iter()
            .map(|v| crate::primitive::decode_int(v.bytes_or_empty()).unwrap())
            .collect();
        assert_eq!(vals, vec![1, 2, 3]);
    }

    #[test]
    fn compare_orders_unset_before_present() {
        let ctx = Context::new();
        let i64t = ctx.primitive(Primitive::Int64);
        let a = Value::unset(i64t.clone());
        let b = Value::parse(&i64t, "0").unwrap();
        assert_eq!(compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn field_by_path_descends_nested_records() {
        let ctx = Context::new();
        let i64t = ctx.primitive(Primitive::Int64);
        let inner_ty = ctx
            .lookup_type_record(vec![Column { name: "y".into(), ty: i64t.clone() }])
            .unwrap();
        let outer_ty = ctx
            .lookup_type_record(vec![Column { name: "x".into(), ty: inner_ty.clone() }])
            .unwrap();
        let inner = Value::build_record(inner_ty, &[Value::parse(&i64t, "7").unwrap()]).unwrap();
        let outer = Value::build_record(outer_ty, &[inner]).unwrap();
        let found = outer.field_by_path(&["x", "y"]).unwrap();
        assert_eq!(found.format(crate::escape::OutFmt::Primary), "7");
    }
}
