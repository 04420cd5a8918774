//! Seams to the excluded collaborators: document retrieval, account/tax
//! resolution and ledger export live behind these traits; the core stays
//! pure and synchronous.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::ingestion::{CustomerRef, SourceDocument};
use crate::schema::{AccountingProps, LedgerRecord, MonthKey};

/// Half-open creation-time window `[from, to)` in accounting-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

/// Per-run memoization for the document source's repeated lookups. Created
/// at the start of a run and dropped with it; there is no process-wide
/// cache.
#[derive(Debug, Default)]
pub struct RunCache {
    documents: HashMap<String, SourceDocument>,
    tax_rates: HashMap<String, Decimal>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, id: &str) -> Option<&SourceDocument> {
        self.documents.get(id)
    }

    pub fn insert_document(&mut self, document: SourceDocument) -> &SourceDocument {
        self.documents
            .entry(document.id.clone())
            .or_insert(document)
    }

    pub fn tax_rate_or_insert_with(
        &mut self,
        id: &str,
        lookup: impl FnOnce() -> Decimal,
    ) -> Decimal {
        *self
            .tax_rates
            .entry(id.to_string())
            .or_insert_with(lookup)
    }
}

/// Yields fully expanded documents for a creation-time window. Pagination,
/// rate limits and reference expansion happen behind this trait; timestamps
/// arrive already converted to accounting-local wall-clock time.
pub trait DocumentSource {
    fn fetch_documents(
        &mut self,
        window: &RunWindow,
        cache: &mut RunCache,
    ) -> Result<Vec<SourceDocument>>;
}

/// Maps a customer and document to ledger accounts and tax classification.
/// Pure with respect to the run: the same inputs must yield the same props.
pub trait AccountingPropsResolver {
    fn resolve(&self, customer: &CustomerRef, document: &SourceDocument)
        -> Result<AccountingProps>;
}

/// Consumes the ordered ledger records of one run, one call per calendar
/// month partition, in ascending month order.
pub trait LedgerSink {
    fn write_month(&mut self, month: MonthKey, records: &[LedgerRecord]) -> Result<()>;
}
