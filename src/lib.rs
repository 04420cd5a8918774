//! # Revenue Ledger Builder
//!
//! A library for converting a payment provider's billing documents
//! (invoices, charges, credit notes) into double-entry bookkeeping records
//! with exact-cent revenue recognition: each billed amount is recognized in
//! the calendar months its service period covers, independent of when it
//! was invoiced or paid, and the not-yet-earned portion is parked in a
//! deferred revenue clearing account until its month arrives.
//!
//! ## Core Concepts
//!
//! - **Recognition period**: the span over which a billed amount is earned,
//!   taken from structured provider data or parsed out of the line item
//!   text as a fallback
//! - **Month split**: pro-rata apportionment over the calendar months a
//!   period touches, with the rounding error folded into the last month so
//!   slices always re-sum to the original amount exactly
//! - **Deferral**: park/release posting pairs through a clearing account
//!   for every recognition month starting after the accounting date,
//!   including the unwind when a document is voided, becomes uncollectible
//!   or is credited
//! - **Idempotence**: items are rebuilt from the immutable source documents
//!   on every run; identical input produces identical output
//!
//! ## Example
//!
//! ```rust,ignore
//! use revenue_ledger_builder::*;
//!
//! let config = RunConfig::default();
//! let mut report = RunReport::new();
//! let item = assemble_revenue_item(&document, props, &config, &mut report)?
//!     .expect("document not skipped");
//!
//! let output = LedgerProcessor::new(config).process(&[item])?;
//! for (month, records) in output.records_by_month() {
//!     println!("{}: {} record(s)", month, records.len());
//! }
//! ```

pub mod accrual;
pub mod dateparser;
pub mod error;
pub mod ingestion;
pub mod recognition;
pub mod report;
pub mod schema;
pub mod sources;
pub mod utils;

pub use accrual::{revenue_item_records, FixedTermAccrual};
pub use dateparser::find_date_range;
pub use error::{LedgerError, Result};
pub use ingestion::{
    assemble_revenue_item, CreditNote, CustomerRef, DocumentKind, SourceDocument, SourceLineItem,
    StatusTransitions,
};
pub use recognition::{recognized_month_rows, split_months, RecognizedMonth};
pub use report::{DocumentOutcome, DocumentStatus, RunReport, RunWarning, WarningKind};
pub use schema::*;
pub use sources::{AccountingPropsResolver, DocumentSource, LedgerSink, RunCache, RunWindow};

use log::{debug, info};
use std::collections::BTreeMap;

/// Everything one run produces for the export side: the deterministically
/// ordered ledger records and the per-month recognition rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    /// Ordered by calendar month, then source-document order, then
    /// line-item order.
    pub records: Vec<LedgerRecord>,
    pub recognized_months: Vec<RecognizedMonth>,
}

impl RunOutput {
    /// Month partitions for the ledger sink, in ascending month order.
    pub fn records_by_month(&self) -> BTreeMap<MonthKey, Vec<&LedgerRecord>> {
        let mut by_month: BTreeMap<MonthKey, Vec<&LedgerRecord>> = BTreeMap::new();
        for record in &self.records {
            by_month.entry(record.month_key()).or_default().push(record);
        }
        by_month
    }
}

pub struct LedgerProcessor {
    config: RunConfig,
}

impl LedgerProcessor {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Builds all ledger records for the given revenue items. Records are
    /// generated in item and line order, then stably sorted by calendar
    /// month, so callers filtering by month always see the same sequence.
    pub fn process(&self, items: &[RevenueItem]) -> Result<RunOutput> {
        info!("Building ledger records for {} revenue item(s)", items.len());

        let mut records = Vec::new();
        for item in items {
            let item_records = accrual::revenue_item_records(item, &self.config)?;
            debug!("{}: {} record(s)", item.document_ref(), item_records.len());
            records.extend(item_records);
        }

        records.sort_by_key(|record| record.month_key());

        Ok(RunOutput {
            records,
            recognized_months: recognition::recognized_month_rows(items)?,
        })
    }
}

pub fn process_revenue_items(items: &[RevenueItem], config: &RunConfig) -> Result<RunOutput> {
    LedgerProcessor::new(config.clone()).process(items)
}

/// Full pipeline: fetch documents, resolve accounting props, assemble,
/// recognize, and hand each month partition to the sink. Recoverable
/// conditions end up in the returned report; a missing account mapping
/// aborts before anything is written.
pub fn run(
    source: &mut dyn DocumentSource,
    resolver: &dyn AccountingPropsResolver,
    sink: &mut dyn LedgerSink,
    window: &RunWindow,
    config: &RunConfig,
) -> Result<(RunOutput, RunReport)> {
    let mut cache = RunCache::new();
    let documents = source.fetch_documents(window, &mut cache)?;
    info!("Retrieved {} document(s)", documents.len());

    let mut report = RunReport::new();
    let mut items = Vec::new();
    for document in &documents {
        let props = resolver.resolve(&document.customer, document)?;
        if let Some(item) = ingestion::assemble_revenue_item(document, props, config, &mut report)? {
            items.push(item);
        }
    }

    let output = process_revenue_items(&items, config)?;
    for (month, records) in output.records_by_month() {
        let owned: Vec<LedgerRecord> = records.into_iter().cloned().collect();
        sink.write_month(month, &owned)?;
    }

    info!("{}", report.summary());
    Ok((output, report))
}
