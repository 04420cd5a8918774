use crate::error::{LedgerError, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed wall-clock interval `[start, end]` in the accounting timezone,
/// inclusive of both endpoints. A degenerate period (`start == end`) marks a
/// point-in-time, non-recurring charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Period {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if end < start {
            return Err(LedgerError::InvalidPeriod(format!(
                "period end {} before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Point-in-time period: recognized immediately, never deferred.
    pub fn instant(at: NaiveDateTime) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// One calendar month's share of a split period. `start` is clamped to the
/// period start in the first slice and `end` to the period end in the last;
/// `amounts` runs parallel to the input amounts of the split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthSlice {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub amounts: Vec<Decimal>,
}

/// Ledger account assignment for one document, resolved externally from the
/// customer's tax profile. Opaque to the recognition engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingProps {
    pub customer_account: String,
    pub revenue_account: String,
    pub tax_key: Option<String>,
    pub vat_id: Option<String>,
    pub country_region: String,
}

/// A later legal reversal of a document's effect. At most one event applies
/// per document; anything else is an unsupported shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", tag = "kind")]
pub enum ReversalEvent {
    Voided { at: NaiveDateTime },
    MarkedUncollectible { at: NaiveDateTime },
    /// Partial or full credit note. For multi-line documents the credited
    /// amount is prorated uniformly across line items
    /// (`line gross x credited / document gross`); the provider does not
    /// attribute credit notes to individual lines.
    Credited {
        at: NaiveDateTime,
        amount_with_tax: Decimal,
    },
}

impl ReversalEvent {
    pub fn occurred_at(&self) -> NaiveDateTime {
        match self {
            ReversalEvent::Voided { at } => *at,
            ReversalEvent::MarkedUncollectible { at } => *at,
            ReversalEvent::Credited { at, .. } => *at,
        }
    }
}

/// One revenue-bearing line within a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub index: usize,
    pub text: String,
    pub period: Period,
    pub amount_net: Decimal,
    pub amount_with_tax: Decimal,
}

/// Classification for downstream reporting only; recognition logic never
/// branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RevenueType {
    Prepaid,
    PayPerUse,
}

/// The unit the recognition engine operates on, derived fresh from the
/// source document on every run. `amount_with_tax` is immutable once the
/// document took legal effect; only `reversal` overlays a correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueItem {
    pub id: String,
    pub number: Option<String>,
    /// Posting label, e.g. "Invoice INV-0042" or "Receipt 1234-5678".
    pub text: String,
    /// The accounting date the document legally took effect (finalization or
    /// payment date, not the creation timestamp).
    pub created: NaiveDateTime,
    pub amount_net: Decimal,
    pub amount_with_tax: Decimal,
    pub accounting_props: AccountingProps,
    pub line_items: Vec<LineItem>,
    pub reversal: Option<ReversalEvent>,
    pub is_recurring: bool,
    pub revenue_type: RevenueType,
}

impl RevenueItem {
    pub fn document_ref(&self) -> &str {
        self.number.as_deref().unwrap_or(&self.id)
    }
}

/// Posting side, DATEV "Soll/Haben-Kennzeichen".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Debit => "S",
            Side::Credit => "H",
        }
    }

    fn flipped(self) -> Self {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single double-entry posting. Amounts are stored non-negative; the
/// constructors flip the side for negative input so a record always reads
/// "move `amount` from `contra_account` to `account`" (debit) or the
/// reverse (credit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub date: NaiveDateTime,
    pub amount: Decimal,
    pub side: Side,
    pub account: String,
    pub contra_account: String,
    pub tax_key: Option<String>,
    pub text: String,
    pub document_ref: Option<String>,
}

impl LedgerRecord {
    fn new(
        date: NaiveDateTime,
        amount: Decimal,
        side: Side,
        account: &str,
        contra_account: &str,
        text: &str,
    ) -> Self {
        let (amount, side) = if amount.is_sign_negative() {
            (-amount, side.flipped())
        } else {
            (amount, side)
        };
        Self {
            date,
            amount,
            side,
            account: account.to_string(),
            contra_account: contra_account.to_string(),
            tax_key: None,
            text: text.to_string(),
            document_ref: None,
        }
    }

    pub fn debit(
        date: NaiveDateTime,
        amount: Decimal,
        account: &str,
        contra_account: &str,
        text: &str,
    ) -> Self {
        Self::new(date, amount, Side::Debit, account, contra_account, text)
    }

    pub fn credit(
        date: NaiveDateTime,
        amount: Decimal,
        account: &str,
        contra_account: &str,
        text: &str,
    ) -> Self {
        Self::new(date, amount, Side::Credit, account, contra_account, text)
    }

    pub fn with_tax_key(mut self, tax_key: Option<&str>) -> Self {
        self.tax_key = tax_key.map(|k| k.to_string());
        self
    }

    pub fn with_document_ref(mut self, document_ref: &str) -> Self {
        self.document_ref = Some(document_ref.to_string());
        self
    }

    pub fn month_key(&self) -> MonthKey {
        MonthKey::of(self.date)
    }
}

/// Calendar month bucket used for ordering and export partitioning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(at: NaiveDateTime) -> Self {
        use chrono::Datelike;
        Self {
            year: at.year(),
            month: at.month(),
        }
    }
}

impl std::fmt::Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Per-run settings, typically deserialized from the operator's config file.
/// The timezone is a label only: all instants handed to the core are already
/// wall-clock values in that zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub timezone: String,
    pub currency: String,
    /// Clearing account holding deferred (not yet earned) revenue.
    pub deferred_revenue_account: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Berlin".to_string(),
            currency: "eur".to_string(),
            deferred_revenue_account: "990".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_period_rejects_reversed_bounds() {
        assert!(Period::new(dt(2021, 2, 1), dt(2021, 1, 1)).is_err());
        let p = Period::new(dt(2021, 1, 1), dt(2021, 1, 1)).unwrap();
        assert!(p.is_instant());
        assert_eq!(p.duration_seconds(), 0);
    }

    #[test]
    fn test_negative_amount_flips_side() {
        let rec = LedgerRecord::debit(dt(2021, 3, 1), dec!(-12.34), "8400", "990", "x");
        assert_eq!(rec.amount, dec!(12.34));
        assert_eq!(rec.side, Side::Credit);

        let rec = LedgerRecord::credit(dt(2021, 3, 1), dec!(-1), "8400", "990", "x");
        assert_eq!(rec.side, Side::Debit);
    }

    #[test]
    fn test_month_key_ordering_and_display() {
        let a = MonthKey { year: 2021, month: 12 };
        let b = MonthKey { year: 2022, month: 1 };
        assert!(a < b);
        assert_eq!(a.to_string(), "2021-12");
    }

    #[test]
    fn test_run_config_defaults_from_empty_json() {
        let config: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.deferred_revenue_account, "990");
        assert_eq!(config.currency, "eur");
    }
}
