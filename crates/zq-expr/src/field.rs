//! Field-path expressions: the `a.b.c` accessors used by `cut`, `put`,
//! `sort`, and `group-by` key lists to pull a (possibly nested) column out
//! of a record.

use crate::compare::Predicate;
use zq_core::Value;

/// A dotted field reference, already split into its component names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(pub Vec<String>);

impl FieldPath {
    pub fn parse(s: &str) -> FieldPath {
        FieldPath(s.split('.').map(|p| p.to_string()).collect())
    }

    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    /// Resolves this path against a record value, returning `None` if any
    /// intermediate segment is absent or not a record (cut/put treat that
    /// as the field simply not being present, not an error).
    pub fn get<'v>(&self, v: &Value) -> Option<Value> {
        let refs: Vec<&str> = self.0.iter().map(String::as_str).collect();
        v.field_by_path(&refs)
    }
}

/// Lifts a predicate over a single value into a predicate over a whole
/// record, applied to the named field. A record missing the field never
/// matches, matching `cut`/`put`'s "absent field" convention.
pub fn on_field(path: FieldPath, pred: Predicate) -> Predicate {
    Box::new(move |rec: &Value| path.get(rec).map(|v| pred(&v)).unwrap_or(false))
}
