//! Self-describing type system. Types are interned per [`Context`]: two
//! types with identical structure constructed in the same context share one
//! identity (`Arc` pointer equality), mirroring `original_source`'s
//! `zng/resolver.Context`. Records, arrays, sets, unions, maps and aliases
//! are all built on top of a fixed set of [`Primitive`] leaf kinds.

use crate::error::{Result, TypeError};
use crate::primitive::Primitive;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug)]
pub struct RecordType {
    pub columns: Vec<Column>,
}

impl RecordType {
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

#[derive(Debug)]
pub struct AliasType {
    pub name: String,
    pub of: Type,
}

/// The structural payload of an interned type, discriminated by kind for
/// dispatch. Avoids an inheritance hierarchy; every operation on `Type`
/// switches on this discriminant.
#[derive(Debug)]
pub enum TypeKind {
    Primitive(Primitive),
    Record(RecordType),
    Array(Type),
    Set(Type),
    Union(Vec<Type>),
    Map(Type, Type),
    Alias(AliasType),
}

#[derive(Debug)]
struct TypeData {
    id: u32,
    kind: TypeKind,
}

/// A reference-counted, interned type. Cheap to clone; equality and hashing
/// are by interned id, not structural comparison.
#[derive(Debug, Clone)]
pub struct Type(Arc<TypeData>);

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Type {}
impl std::hash::Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state)
    }
}

impl Type {
    pub fn id(&self) -> u32 {
        self.0.id
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn is_container(&self) -> bool {
        matches!(
            Context::aliased(self).0.kind,
            TypeKind::Record(_) | TypeKind::Array(_) | TypeKind::Set(_) | TypeKind::Union(_) | TypeKind::Map(_, _)
        )
    }

    pub fn is_primitive(&self) -> bool {
        matches!(Context::aliased(self).0.kind, TypeKind::Primitive(_))
    }

    /// The element type of an array/set, unwrapping aliases. `None` for
    /// non-sequence containers.
    pub fn inner_type(&self) -> Option<Type> {
        match &Context::aliased(self).0.kind {
            TypeKind::Array(t) | TypeKind::Set(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match &Context::aliased(self).0.kind {
            TypeKind::Record(r) => Some(r),
            _ => None,
        }
    }

    /// `Parse` — textual literal to encoded bytes. Containers cannot be
    /// parsed from a bare literal; callers build container values field by
    /// field via `zq-core::value` helpers.
    pub fn parse(&self, text: &str) -> Result<Vec<u8>> {
        match &self.0.kind {
            TypeKind::Primitive(p) => p.parse(text),
            TypeKind::Alias(a) => a.of.parse(text),
            other => Err(TypeError::Mismatch {
                expected: "primitive".into(),
                found: format!("{other:?}"),
            }),
        }
    }

    /// `Marshal` — decode to a JSON-ish native value, recursing through
    /// containers.
    pub fn marshal(&self, bytes: Option<&[u8]>) -> Result<serde_json::Value> {
        let Some(bytes) = bytes else {
            return Ok(serde_json::Value::Null);
        };
        match &self.0.kind {
            TypeKind::Primitive(p) => p.marshal(bytes),
            TypeKind::Alias(a) => a.of.marshal(Some(bytes)),
            TypeKind::Array(inner) | TypeKind::Set(inner) => {
                let mut out = Vec::new();
                let mut it = crate::zcode::Iter::new(bytes);
                while let Some(child) = it.next()? {
                    out.push(inner.marshal(child)?);
                }
                Ok(serde_json::Value::Array(out))
            }
            TypeKind::Record(rec) => {
                let mut map = serde_json::Map::new();
                let mut it = crate::zcode::Iter::new(bytes);
                for col in &rec.columns {
                    let child = it.next()?.unwrap_or(None);
                    map.insert(col.name.clone(), col.ty.marshal(child)?);
                }
                Ok(serde_json::Value::Object(map))
            }
            TypeKind::Union(types) => {
                let mut it = crate::zcode::Iter::new(bytes);
                let tag_bytes = it
                    .next()?
                    .flatten()
                    .ok_or(TypeError::Other("empty union".into()))?;
                let tag = crate::primitive::decode_uint(tag_bytes)? as usize;
                let payload = it.next()?.unwrap_or(None);
                let ty = types
                    .get(tag)
                    .ok_or(TypeError::BadUnionTag(tag as u32))?;
                ty.marshal(payload)
            }
            TypeKind::Map(kt, vt) => {
                let mut out = Vec::new();
                let mut it = crate::zcode::Iter::new(bytes);
                while let Some(k) = it.next()? {
                    let v = it.next()?.unwrap_or(None);
                    out.push(serde_json::json!({
                        "key": kt.marshal(k)?,
                        "value": vt.marshal(v)?,
                    }));
                }
                Ok(serde_json::Value::Array(out))
            }
        }
    }

    /// `StringOf` — format to the chosen textual format.
    pub fn string_of(&self, bytes: &[u8], fmt: crate::escape::OutFmt, in_container: bool) -> String {
        match &self.0.kind {
            TypeKind::Primitive(p) => p.string_of(bytes, fmt, in_container),
            TypeKind::Alias(a) => a.of.string_of(bytes, fmt, in_container),
            TypeKind::Array(inner) | TypeKind::Set(inner) => {
                let mut parts = Vec::new();
                let mut it = crate::zcode::Iter::new(bytes);
                while let Ok(Some(child)) = it.next() {
                    parts.push(match child {
                        Some(c) => inner.string_of(c, fmt, true),
                        None => "-".to_string(),
                    });
                }
                format!("[{}]", parts.join(","))
            }
            TypeKind::Record(rec) => {
                let mut parts = Vec::new();
                let mut it = crate::zcode::Iter::new(bytes);
                for col in &rec.columns {
                    if let Ok(Some(child)) = it.next() {
                        let s = match child {
                            Some(c) => col.ty.string_of(c, fmt, true),
                            None => "-".to_string(),
                        };
                        parts.push(format!("{}:{}", col.name, s));
                    }
                }
                format!("{{{}}}", parts.join(","))
            }
            _ => format!("<{:?}>", self.0.kind),
        }
    }

    /// The alias name this type is written under, if it is (or is wrapped
    /// in) an alias. Textual output prefers the alias name over the
    /// underlying structural name (spec §3).
    pub fn alias_name(&self) -> Option<&str> {
        match &self.0.kind {
            TypeKind::Alias(a) => Some(&a.name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            TypeKind::Primitive(p) => write!(f, "{}", p.name()),
            TypeKind::Alias(a) => write!(f, "{}", a.name),
            TypeKind::Array(t) => write!(f, "[{}]", t),
            TypeKind::Set(t) => write!(f, "set[{}]", t),
            TypeKind::Union(ts) => {
                let parts: Vec<_> = ts.iter().map(|t| t.to_string()).collect();
                write!(f, "union[{}]", parts.join(","))
            }
            TypeKind::Map(k, v) => write!(f, "map[{},{}]", k, v),
            TypeKind::Record(r) => {
                let parts: Vec<_> = r.columns.iter().map(|c| format!("{}:{}", c.name, c.ty)).collect();
                write!(f, "{{{}}}", parts.join(","))
            }
        }
    }
}

/// Interning key for structural dedup; built from already-interned child
/// ids, so comparing keys never requires a recursive structural walk.
#[derive(PartialEq, Eq, Hash)]
enum InternKey {
    Primitive(Primitive),
    Record(Vec<(String, u32)>),
    Array(u32),
    Set(u32),
    Union(Vec<u32>),
    Map(u32, u32),
    Alias(String, u32),
}

struct ContextInner {
    next_id: u32,
    table: HashMap<InternKey, Type>,
    by_id: Vec<Type>,
}

/// A processing context: the per-query interning domain for [`Type`]s.
/// Reads dominate; interning a new structural shape takes the internal lock
/// briefly (spec §5).
pub struct Context {
    inner: Mutex<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            inner: Mutex::new(ContextInner {
                next_id: 0,
                table: HashMap::new(),
                by_id: Vec::new(),
            }),
        }
    }

    fn intern(&self, key: InternKey, kind: TypeKind) -> Type {
        let mut inner = self.inner.lock().unwrap();
        if let Some(t) = inner.table.get(&key) {
            return t.clone();
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let t = Type(Arc::new(TypeData { id, kind }));
        inner.table.insert(key, t.clone());
        inner.by_id.push(t.clone());
        t
    }

    pub fn lookup_by_id(&self, id: u32) -> Option<Type> {
        self.inner.lock().unwrap().by_id.get(id as usize).cloned()
    }

    pub fn lookup_primitive(&self, name: &str) -> Option<Type> {
        Primitive::lookup(name).map(|p| self.primitive(p))
    }

    pub fn primitive(&self, p: Primitive) -> Type {
        self.intern(InternKey::Primitive(p), TypeKind::Primitive(p))
    }

    pub fn lookup_type_record(&self, columns: Vec<Column>) -> Result<Type> {
        let mut seen = std::collections::HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.as_str()) {
                return Err(TypeError::Other(format!("duplicate column {:?}", c.name)));
            }
        }
        let key = InternKey::Record(columns.iter().map(|c| (c.name.clone(), c.ty.id())).collect());
        Ok(self.intern(key, TypeKind::Record(RecordType { columns })))
    }

    pub fn lookup_type_array(&self, inner: Type) -> Type {
        self.intern(InternKey::Array(inner.id()), TypeKind::Array(inner))
    }

    pub fn lookup_type_set(&self, inner: Type) -> Type {
        self.intern(InternKey::Set(inner.id()), TypeKind::Set(inner))
    }

    pub fn lookup_type_union(&self, types: Vec<Type>) -> Type {
        let key = InternKey::Union(types.iter().map(|t| t.id()).collect());
        self.intern(key, TypeKind::Union(types))
    }

    pub fn lookup_type_map(&self, key_ty: Type, val_ty: Type) -> Type {
        let key = InternKey::Map(key_ty.id(), val_ty.id());
        self.intern(key, TypeKind::Map(key_ty, val_ty))
    }

    /// Create or fetch the named alias over `of`. Re-declaring the same name
    /// over a structurally different underlying type is a conflict — alias
    /// equality uses the underlying type's identity for computation, so two
    /// different underlying types cannot safely share a name.
    pub fn lookup_type_alias(&self, name: String, of: Type) -> Result<Type> {
        let mut inner = self.inner.lock().unwrap();
        let key = InternKey::Alias(name.clone(), of.id());
        if let Some(t) = inner.table.get(&key) {
            return Ok(t.clone());
        }
        // Conflict check: same name, different underlying id, already bound.
        for existing in inner.by_id.iter() {
            if let TypeKind::Alias(a) = &existing.0.kind {
                if a.name == name && a.of.id() != of.id() {
                    return Err(TypeError::AliasConflict(name));
                }
            }
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let t = Type(Arc::new(TypeData {
            id,
            kind: TypeKind::Alias(AliasType { name, of }),
        }));
        inner.table.insert(key, t.clone());
        inner.by_id.push(t.clone());
        Ok(t)
    }

    /// Unwrap an alias chain until a non-alias type is reached.
    pub fn aliased(t: &Type) -> Type {
        let mut cur = t.clone();
        while let TypeKind::Alias(a) = &cur.0.kind {
            cur = a.of.clone();
        }
        cur
    }

    /// Translate a type interned in a foreign `Context` into this context's
    /// identity space, recursively re-interning its structure.
    pub fn translate_type(&self, foreign: &Type) -> Result<Type> {
        Ok(match &foreign.0.kind {
            TypeKind::Primitive(p) => self.primitive(*p),
            TypeKind::Array(inner) => {
                let t = self.translate_type(inner)?;
                self.lookup_type_array(t)
            }
            TypeKind::Set(inner) => {
                let t = self.translate_type(inner)?;
                self.lookup_type_set(t)
            }
            TypeKind::Union(types) => {
                let ts: Result<Vec<_>> = types.iter().map(|t| self.translate_type(t)).collect();
                self.lookup_type_union(ts?)
            }
            TypeKind::Map(k, v) => {
                let k = self.translate_type(k)?;
                let v = self.translate_type(v)?;
                self.lookup_type_map(k, v)
            }
            TypeKind::Record(r) => {
                let cols: Result<Vec<_>> = r
                    .columns
                    .iter()
                    .map(|c| -> Result<Column> {
                        Ok(Column {
                            name: c.name.clone(),
                            ty: self.translate_type(&c.ty)?,
                        })
                    })
                    .collect();
                self.lookup_type_record(cols?)?
            }
            TypeKind::Alias(a) => {
                let of = self.translate_type(&a.of)?;
                self.lookup_type_alias(a.name.clone(), of)?
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_intern_to_same_id() {
        let ctx = Context::new();
        let a = ctx.primitive(Primitive::Int64);
        let b = ctx.lookup_primitive("int64").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn records_with_same_shape_share_identity() {
        let ctx = Context::new();
        let i64t = ctx.primitive(Primitive::Int64);
        let r1 = ctx
            .lookup_type_record(vec![Column { name: "a".into(), ty: i64t.clone() }])
            .unwrap();
        let r2 = ctx
            .lookup_type_record(vec![Column { name: "a".into(), ty: i64t }])
            .unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn alias_unwraps_to_underlying() {
        let ctx = Context::new();
        let i64t = ctx.primitive(Primitive::Int64);
        let alias = ctx.lookup_type_alias("port_count".into(), i64t.clone()).unwrap();
        assert_ne!(alias, i64t);
        assert_eq!(Context::aliased(&alias), i64t);
        assert_eq!(alias.alias_name(), Some("port_count"));
    }

    #[test]
    fn alias_conflict_is_rejected() {
        let ctx = Context::new();
        let i64t = ctx.primitive(Primitive::Int64);
        let strt = ctx.primitive(Primitive::String);
        ctx.lookup_type_alias("foo".into(), i64t).unwrap();
        assert!(ctx.lookup_type_alias("foo".into(), strt).is_err());
    }

    #[test]
    fn translate_reinterns_in_target_context() {
        let src = Context::new();
        let dst = Context::new();
        let i64t = src.primitive(Primitive::Int64);
        let arr = src.lookup_type_array(i64t);
        let translated = dst.translate_type(&arr).unwrap();
        let expect = dst.lookup_type_array(dst.primitive(Primitive::Int64));
        assert_eq!(translated, expect);
    }
}
