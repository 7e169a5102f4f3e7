//! # zq-expr — field access, comparisons, and functions
//!
//! The expression engine shared by `filter`, `put`, `sort`, and `group-by`:
//! [`field::FieldPath`] for dotted column access, [`compare`] for
//! coercion-rule literal comparisons (`zx.Comparison` in the original),
//! [`logical`] for and/or/not/wildcard combination, and [`function`] for
//! the built-in `String.*`/`Math.*`/`Time.*` registry used by `put`.

pub mod compare;
pub mod error;
pub mod expr;
pub mod field;
pub mod function;
pub mod logical;

pub use compare::{comparison, contains, Literal, Op, Predicate};
pub use error::{ExprError, Result};
pub use expr::Expr;
pub use field::{on_field, FieldPath};
pub use function::{lookup as lookup_function, Function};
pub use logical::{and, not, or, wildcard_to_regex};
