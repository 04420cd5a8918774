//! Normalizes typed provider documents into [`RevenueItem`]s. This is the
//! only place that looks at raw document fields; everything downstream
//! operates on the normalized model.

use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dateparser;
use crate::error::Result;
use crate::report::{DocumentStatus, RunReport, WarningKind};
use crate::schema::{
    AccountingProps, LineItem, Period, ReversalEvent, RevenueItem, RevenueType, RunConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DocumentKind {
    Invoice,
    Charge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: String,
    pub name: Option<String>,
}

/// Legal status transition timestamps, already converted to wall-clock time
/// in the accounting timezone by the document source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransitions {
    pub finalized_at: Option<NaiveDateTime>,
    pub paid_at: Option<NaiveDateTime>,
    pub voided_at: Option<NaiveDateTime>,
    pub marked_uncollectible_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNote {
    pub id: String,
    pub number: Option<String>,
    pub created: NaiveDateTime,
    pub total_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLineItem {
    pub description: Option<String>,
    /// Net amount in minor units (cents), tax excluded.
    pub amount_minor: i64,
    pub tax_minor: Option<i64>,
    /// Structured service period, when the provider supplies one.
    pub period: Option<(NaiveDateTime, NaiveDateTime)>,
    pub recurring: bool,
}

/// A billing document as handed over by the document source: references
/// expanded, amounts in minor units, timestamps in accounting-local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub kind: DocumentKind,
    pub number: Option<String>,
    /// The date the document legally took effect (finalization for
    /// invoices, payment capture for charges).
    pub created: NaiveDateTime,
    pub currency: String,
    pub customer: CustomerRef,
    pub total_minor: i64,
    pub tax_minor: Option<i64>,
    pub status_transitions: StatusTransitions,
    pub line_items: Vec<SourceLineItem>,
    pub credit_notes: Vec<CreditNote>,
}

impl SourceDocument {
    pub fn document_ref(&self) -> &str {
        self.number.as_deref().unwrap_or(&self.id)
    }
}

fn minor_to_decimal(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

fn document_text(doc: &SourceDocument) -> String {
    match (doc.kind, &doc.number) {
        (DocumentKind::Invoice, Some(number)) => format!("Invoice {}", number),
        (DocumentKind::Invoice, None) => format!("Invoice {}", doc.id),
        (DocumentKind::Charge, Some(number)) => format!("Receipt {}", number),
        (DocumentKind::Charge, None) => format!("Charge {}", doc.id),
    }
}

/// Determines the document's reversal event from its status transitions and
/// credit notes. `Ok(None)` means no reversal; an unsupported combination
/// (several simultaneous signals, or refunds fanned out over more than one
/// credit note) returns `Err` with the offending detail.
fn resolve_reversal(doc: &SourceDocument) -> std::result::Result<Option<ReversalEvent>, String> {
    let transitions = &doc.status_transitions;
    let signals = usize::from(transitions.voided_at.is_some())
        + usize::from(transitions.marked_uncollectible_at.is_some())
        + usize::from(!doc.credit_notes.is_empty());
    if signals > 1 {
        return Err("multiple simultaneous reversal events".to_string());
    }
    if doc.credit_notes.len() > 1 {
        return Err(format!(
            "refund fan-out across {} credit notes",
            doc.credit_notes.len()
        ));
    }

    if let Some(at) = transitions.voided_at {
        return Ok(Some(ReversalEvent::Voided { at }));
    }
    if let Some(at) = transitions.marked_uncollectible_at {
        return Ok(Some(ReversalEvent::MarkedUncollectible { at }));
    }
    if let Some(note) = doc.credit_notes.first() {
        return Ok(Some(ReversalEvent::Credited {
            at: note.created,
            amount_with_tax: minor_to_decimal(note.total_minor),
        }));
    }
    Ok(None)
}

/// Resolves one line item's recognition period: structured data first (a
/// degenerate structured period counts as absent), then the text parser,
/// then warn-and-degrade to a point period at `created`.
fn resolve_period(
    doc: &SourceDocument,
    line: &SourceLineItem,
    created: NaiveDateTime,
    report: &mut RunReport,
) -> (Period, bool) {
    if let Some((start, end)) = line.period {
        if start != end {
            if let Ok(period) = Period::new(start, end) {
                return (period, false);
            }
        }
    }

    if let Some(description) = &line.description {
        if let Some(period) = dateparser::find_date_range(description, Some(created)) {
            return (period, false);
        }
    }

    report.warn(
        doc.document_ref(),
        WarningKind::AmbiguousPeriod,
        format!(
            "unknown period for line item '{}', recognizing on {}",
            line.description.as_deref().unwrap_or("(no description)"),
            created.date()
        ),
    );
    (Period::instant(created), true)
}

/// Maps one source document to a [`RevenueItem`]. Returns `Ok(None)` when
/// the document is skipped (foreign currency, unsupported shape); the skip
/// is recorded in the report. Accounting props must already be resolved --
/// a missing mapping is the caller's fatal configuration error.
pub fn assemble_revenue_item(
    doc: &SourceDocument,
    props: AccountingProps,
    config: &RunConfig,
    report: &mut RunReport,
) -> Result<Option<RevenueItem>> {
    let doc_ref = doc.document_ref().to_string();

    if doc.currency != config.currency {
        report.warn(
            &doc_ref,
            WarningKind::ForeignCurrency,
            format!("currency {} is not the run currency {}", doc.currency, config.currency),
        );
        report.record(&doc_ref, DocumentStatus::Skipped);
        return Ok(None);
    }

    let reversal = match resolve_reversal(doc) {
        Ok(reversal) => reversal,
        Err(details) => {
            report.warn(&doc_ref, WarningKind::UnsupportedShape, details);
            report.record(&doc_ref, DocumentStatus::Skipped);
            return Ok(None);
        }
    };

    let amount_with_tax = minor_to_decimal(doc.total_minor);
    let tax = minor_to_decimal(doc.tax_minor.unwrap_or(0));
    let text = document_text(doc);

    if let Some(ReversalEvent::Credited { amount_with_tax: credited, .. }) = &reversal {
        if *credited == amount_with_tax {
            report.warn(
                &doc_ref,
                WarningKind::FullyRefunded,
                "document fully credited, please check",
            );
        }
    }

    let mut degraded = false;
    let mut line_items = Vec::with_capacity(doc.line_items.len());
    for (idx, line) in doc.line_items.iter().enumerate() {
        let (period, line_degraded) = resolve_period(doc, line, doc.created, report);
        degraded |= line_degraded;

        let line_net = minor_to_decimal(line.amount_minor);
        let line_gross = minor_to_decimal(line.amount_minor + line.tax_minor.unwrap_or(0));
        let line_text = match &line.description {
            Some(description) => format!("{} / {}", text, description),
            None => text.clone(),
        };

        line_items.push(LineItem {
            index: idx + 1,
            text: line_text,
            period,
            amount_net: line_net,
            amount_with_tax: line_gross,
        });
    }

    let revenue_type = match line_items.last() {
        Some(last) if last.period.end > doc.created + Duration::days(1) => RevenueType::Prepaid,
        _ => RevenueType::PayPerUse,
    };
    let is_recurring = doc.line_items.iter().any(|line| line.recurring);

    report.record(
        &doc_ref,
        if degraded {
            DocumentStatus::Degraded
        } else {
            DocumentStatus::Processed
        },
    );

    Ok(Some(RevenueItem {
        id: doc.id.clone(),
        number: doc.number.clone(),
        text,
        created: doc.created,
        amount_net: amount_with_tax - tax,
        amount_with_tax,
        accounting_props: props,
        line_items,
        reversal,
        is_recurring,
        revenue_type,
    }))
}
