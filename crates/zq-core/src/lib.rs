//! # zq-core — self-describing type system and value encoding
//!
//! This crate provides the foundational typed-value model shared by every
//! layer of the `zq` pipeline runtime: a per-[`Context`] interned [`Type`]
//! system (primitives, record, array, set, union, map, alias) and a
//! `(Type, Bytes)` [`Value`] representation that bijectively preserves the
//! nil / unset / empty-container distinction described in the data model.
//!
//! ## Layout
//!
//! - [`primitive`]: the fixed set of leaf kinds and their text/binary codecs.
//! - [`types`]: `Type`, `Context` (interning), and container type kinds.
//! - [`value`]: `Value`, record/array/set construction, and the general
//!   value comparator used by `sort` and group-by.
//! - [`zcode`]: the low-level tagged, length-prefixed container encoding.
//! - [`escape`]: textual escape discipline for strings and byte-strings.

pub mod error;
pub mod escape;
pub mod primitive;
pub mod span;
pub mod types;
pub mod value;
pub mod zcode;

pub use error::{Result, TypeError};
pub use escape::OutFmt;
pub use primitive::Primitive;
pub use span::{Span, Ts};
pub use types::{AliasType, Column, Context, RecordType, Type, TypeKind};
pub use value::{compare, record_of, Value};
