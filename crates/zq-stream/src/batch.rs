//! `Batch` — the unit of transfer between pipeline operators: a bounded,
//! ordered group of records with an optional covering time span.

use zq_core::{Span, Value};

#[derive(Debug, Clone)]
pub struct Batch {
    records: Vec<Value>,
    span: Option<Span>,
}

impl Batch {
    pub fn new(records: Vec<Value>) -> Self {
        Batch { records, span: None }
    }

    pub fn with_span(records: Vec<Value>, span: Span) -> Self {
        Batch { records, span: Some(span) }
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Value> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }

    /// Rough byte-size estimate used by the spill operators' batching
    /// budget (spec §4.4): sum of each record's encoded byte length.
    pub fn byte_size(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.bytes.as_ref().map(|b| b.len()).unwrap_or(0))
            .sum()
    }
}
