//! Turns recognized revenue into double-entry postings: the immediate
//! customer/revenue booking, plus park/release pairs through a deferred
//! revenue clearing account for every recognition month that starts after
//! the document's accounting date, including the unwind of voided,
//! uncollectible or credited documents.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::Result;
use crate::recognition::split_months;
use crate::schema::{LedgerRecord, MonthKey, Period, ReversalEvent, RevenueItem, RunConfig};
use crate::utils::add_months;

/// One park or release movement on the clearing account, before it is
/// rendered into a ledger record. Amounts are signed: the unwind pass
/// produces negative movements that cancel the original ones.
#[derive(Debug, Clone, PartialEq)]
enum DeferralEntry {
    Park {
        date: NaiveDateTime,
        amount: Decimal,
        from: MonthKey,
        to: MonthKey,
    },
    Release {
        date: NaiveDateTime,
        amount: Decimal,
    },
}

impl DeferralEntry {
    fn date(&self) -> NaiveDateTime {
        match self {
            DeferralEntry::Park { date, .. } => *date,
            DeferralEntry::Release { date, .. } => *date,
        }
    }

    /// Signed effect on the clearing account balance: parking increases the
    /// deferred balance, releasing decreases it.
    fn clearing_delta(&self) -> Decimal {
        match self {
            DeferralEntry::Park { amount, .. } => *amount,
            DeferralEntry::Release { amount, .. } => -*amount,
        }
    }
}

/// Runs the splitter over `period` and parks everything whose recognition
/// month starts strictly after `booked`. Returns no entries when the full
/// amount is recognized immediately.
fn deferral_pass(booked: NaiveDateTime, amount: Decimal, period: &Period) -> Result<Vec<DeferralEntry>> {
    let slices = split_months(period, &[amount])?;

    let base_sum: Decimal = slices
        .iter()
        .filter(|slice| slice.start <= booked)
        .map(|slice| slice.amounts[0])
        .sum();
    let forward: Vec<_> = slices.iter().filter(|slice| slice.start > booked).collect();

    let forward_amount = amount - base_sum;
    if forward.is_empty() || forward_amount.is_zero() {
        return Ok(Vec::new());
    }

    let mut entries = vec![DeferralEntry::Park {
        date: booked,
        amount: forward_amount,
        from: MonthKey::of(forward.first().unwrap().start),
        to: MonthKey::of(forward.last().unwrap().start),
    }];
    for slice in forward {
        entries.push(DeferralEntry::Release {
            date: slice.start,
            amount: slice.amounts[0],
        });
    }

    Ok(entries)
}

/// Drops every calendar month whose entries net to exactly zero on the
/// clearing account, then drops the whole schedule if what survives no
/// longer crosses a month boundary (no parking needed).
fn suppress_netted_months(entries: Vec<DeferralEntry>) -> Vec<DeferralEntry> {
    let mut net: BTreeMap<MonthKey, Decimal> = BTreeMap::new();
    for entry in &entries {
        *net.entry(MonthKey::of(entry.date())).or_default() += entry.clearing_delta();
    }

    let kept: Vec<_> = entries
        .into_iter()
        .filter(|entry| !net[&MonthKey::of(entry.date())].is_zero())
        .collect();

    let months: BTreeSet<MonthKey> = kept.iter().map(|e| MonthKey::of(e.date())).collect();
    if months.len() <= 1 {
        return Vec::new();
    }
    kept
}

/// The share of one line item that a reversal unwinds, negated. Partial
/// credits prorate uniformly over the document's gross total.
fn reversal_share(item: &RevenueItem, line_gross: Decimal, event: &ReversalEvent) -> Decimal {
    match event {
        ReversalEvent::Voided { .. } | ReversalEvent::MarkedUncollectible { .. } => -line_gross,
        ReversalEvent::Credited { amount_with_tax, .. } => {
            (-line_gross * amount_with_tax / item.amount_with_tax)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        }
    }
}

/// All postings for one revenue item: the base booking, the per-line
/// deferral schedule (with reversal unwind), and the document-level
/// reversal posting.
pub fn revenue_item_records(item: &RevenueItem, config: &RunConfig) -> Result<Vec<LedgerRecord>> {
    let props = &item.accounting_props;
    let clearing = config.deferred_revenue_account.as_str();
    let document_ref = item.document_ref().to_string();

    let mut records = vec![LedgerRecord::debit(
        item.created,
        item.amount_with_tax,
        &props.customer_account,
        &props.revenue_account,
        &item.text,
    )
    .with_tax_key(props.tax_key.as_deref())
    .with_document_ref(&document_ref)];

    for line in &item.line_items {
        let mut entries = deferral_pass(item.created, line.amount_with_tax, &line.period)?;

        if let Some(event) = &item.reversal {
            let share = reversal_share(item, line.amount_with_tax, event);
            entries.extend(deferral_pass(event.occurred_at(), share, &line.period)?);
        }
        let entries = suppress_netted_months(entries);

        for entry in entries {
            let record = match entry {
                DeferralEntry::Park { date, amount, from, to } => LedgerRecord::debit(
                    date,
                    amount,
                    &props.revenue_account,
                    clearing,
                    &format!("{} / Rueckstellung {} bis {}", line.text, from, to),
                ),
                DeferralEntry::Release { date, amount } => LedgerRecord::debit(
                    date,
                    amount,
                    clearing,
                    &props.revenue_account,
                    &format!("{} / Aufloesung Rueckstellung {}", line.text, MonthKey::of(date)),
                ),
            };
            records.push(record.with_document_ref(&document_ref));
        }
    }

    if let Some(event) = &item.reversal {
        let (amount, label) = match event {
            ReversalEvent::Voided { .. } | ReversalEvent::MarkedUncollectible { .. } => {
                (item.amount_with_tax, format!("Storno {}", item.text))
            }
            ReversalEvent::Credited { amount_with_tax, .. } => {
                (*amount_with_tax, format!("Erstattung {}", item.text))
            }
        };
        records.push(
            LedgerRecord::credit(
                event.occurred_at(),
                amount,
                &props.customer_account,
                &props.revenue_account,
                &label,
            )
            .with_tax_key(props.tax_key.as_deref())
            .with_document_ref(&document_ref),
        );
    }

    Ok(records)
}

/// Manual accrual schedule for fixed-term contracts billed without per-day
/// period data: equal monthly portions rounded down to the cent, the last
/// month absorbing the remainder. When the invoice date already falls inside
/// the revenue span, the first month is recognized immediately and only the
/// remaining months are parked.
#[derive(Debug, Clone)]
pub struct FixedTermAccrual<'a> {
    pub invoice_date: NaiveDateTime,
    pub amount: Decimal,
    pub customer_account: &'a str,
    pub revenue_account: &'a str,
    pub text: &'a str,
    pub first_revenue_date: NaiveDateTime,
    pub spread_months: u32,
    pub include_original_invoice: bool,
}

impl FixedTermAccrual<'_> {
    pub fn records(&self, config: &RunConfig) -> Vec<LedgerRecord> {
        let clearing = config.deferred_revenue_account.as_str();
        let mut records = Vec::new();

        if self.include_original_invoice {
            records.push(LedgerRecord::debit(
                self.invoice_date,
                self.amount,
                self.customer_account,
                self.revenue_account,
                self.text,
            ));
        }

        let per_period = (self.amount / Decimal::from(self.spread_months))
            .round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity);

        let (accrue_amount, accrue_text, mut periods_booked, mut period_date) =
            if self.invoice_date < self.first_revenue_date {
                (
                    self.amount,
                    format!("{} / Rueckstellung ({} Monate)", self.text, self.spread_months),
                    0,
                    self.first_revenue_date,
                )
            } else {
                (
                    self.amount - per_period,
                    format!(
                        "{} / Rueckstellung Anteilig ({}/{} Monate)",
                        self.text,
                        self.spread_months - 1,
                        self.spread_months
                    ),
                    1,
                    next_month(self.first_revenue_date),
                )
            };

        records.push(LedgerRecord::debit(
            self.invoice_date,
            accrue_amount,
            self.revenue_account,
            clearing,
            &accrue_text,
        ));

        let mut remaining = accrue_amount;
        while periods_booked < self.spread_months {
            let period_amount = if periods_booked < self.spread_months - 1 {
                per_period
            } else {
                remaining
            };

            records.push(LedgerRecord::debit(
                period_date,
                period_amount,
                clearing,
                self.revenue_account,
                &format!(
                    "{} / Aufloesung Rueckstellung Monat {}/{}",
                    self.text,
                    periods_booked + 1,
                    self.spread_months
                ),
            ));

            period_date = next_month(period_date);
            periods_booked += 1;
            remaining -= period_amount;
        }

        records
    }
}

fn next_month(at: NaiveDateTime) -> NaiveDateTime {
    add_months(at.date(), 1).and_time(at.time())
}
