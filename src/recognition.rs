//! The revenue recognition engine: apportions monetary amounts across the
//! calendar months a service period spans, with exact-cent conservation.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{LedgerError, Result};
use crate::schema::{MonthKey, MonthSlice, Period, RevenueItem};
use crate::utils::{month_end, month_start, next_month_start};

/// Splits `amounts` across the calendar months overlapping `period`.
///
/// Each month is weighted by its inclusive overlap with the period in whole
/// seconds (a day ends at 23:59:59) relative to the total period duration;
/// per-month shares are rounded half-even to cents. The cumulative rounding
/// error is folded into the last slice so that every amount's slices re-sum
/// to the original exactly, and a trailing slice driven to all-zero by that
/// correction is dropped. All amounts share one set of time weights; the
/// correction is applied independently per amount index.
///
/// A point period (`start == end`) passes through as a single slice with
/// the amounts unchanged.
pub fn split_months(period: &Period, amounts: &[Decimal]) -> Result<Vec<MonthSlice>> {
    if amounts.is_empty() {
        return Ok(Vec::new());
    }

    if period.is_instant() {
        return Ok(vec![MonthSlice {
            start: period.start,
            end: period.end,
            amounts: amounts.to_vec(),
        }]);
    }

    let total_seconds = period.duration_seconds();
    if total_seconds <= 0 {
        return Err(LedgerError::InvalidPeriod(format!(
            "non-positive duration of {}s between {} and {}",
            total_seconds, period.start, period.end
        )));
    }
    let total = Decimal::from(total_seconds);

    let mut slices: Vec<MonthSlice> = Vec::new();
    let mut remaining: Vec<Decimal> = amounts.to_vec();
    let mut cursor = period.start;

    while cursor <= period.end {
        let start_of_month = month_start(cursor);
        let end_of_month = month_end(cursor);
        let slice_start = period.start.max(start_of_month);
        let slice_end = period.end.min(end_of_month);

        let overlap_seconds = (slice_end - slice_start).num_seconds() + 1;
        let weight = Decimal::from(overlap_seconds) / total;

        let month_amounts: Vec<Decimal> = amounts
            .iter()
            .map(|amount| {
                (amount * weight).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
            })
            .collect();
        for (idx, rest) in remaining.iter_mut().enumerate() {
            *rest -= month_amounts[idx];
        }

        slices.push(MonthSlice {
            start: slice_start,
            end: slice_end,
            amounts: month_amounts,
        });

        cursor = next_month_start(cursor);
    }

    let last = slices.last_mut().unwrap();
    for (idx, amount) in last.amounts.iter_mut().enumerate() {
        *amount += remaining[idx];
    }
    if last.amounts.iter().all(|amount| amount.is_zero()) {
        slices.pop();
    }

    for (idx, amount) in amounts.iter().enumerate() {
        let summed: Decimal = slices.iter().map(|slice| slice.amounts[idx]).sum();
        if summed != *amount {
            return Err(LedgerError::SplitSumMismatch {
                original: *amount,
                summed,
                index: idx,
            });
        }
    }

    Ok(slices)
}

/// One recognized month of one line item, for downstream monthly revenue
/// reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedMonth {
    pub document_id: String,
    pub document_number: Option<String>,
    pub document_date: NaiveDateTime,
    pub recognition_start: NaiveDateTime,
    pub recognition_end: NaiveDateTime,
    pub month: MonthKey,
    pub line_index: usize,
    pub line_text: String,
    pub amount_net: Decimal,
    pub country_region: String,
    /// Date the amount is booked in the accounting system: the document date
    /// while recognition stays within the document's year, January 1st of
    /// the recognition year once it crosses into a later year.
    pub accounting_date: NaiveDateTime,
}

pub fn recognized_month_rows(items: &[RevenueItem]) -> Result<Vec<RecognizedMonth>> {
    let mut rows = Vec::new();

    for item in items {
        for line in &item.line_items {
            for slice in split_months(&line.period, &[line.amount_net])? {
                let accounting_date = if slice.start.year() <= item.created.year() {
                    item.created
                } else {
                    NaiveDate::from_ymd_opt(slice.start.year(), 1, 1)
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap()
                };

                rows.push(RecognizedMonth {
                    document_id: item.id.clone(),
                    document_number: item.number.clone(),
                    document_date: item.created,
                    recognition_start: line.period.start,
                    recognition_end: line.period.end,
                    month: MonthKey::of(slice.start),
                    line_index: line.index,
                    line_text: line.text.clone(),
                    amount_net: slice.amounts[0],
                    country_region: item.accounting_props.country_region.clone(),
                    accounting_date,
                });
            }
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn period(start: NaiveDateTime, end: NaiveDateTime) -> Period {
        Period::new(start, end).unwrap()
    }

    fn single_amounts(slices: &[MonthSlice]) -> Vec<Decimal> {
        slices.iter().map(|s| s.amounts[0]).collect()
    }

    #[test]
    fn test_split_three_months() {
        let p = period(dt(2020, 4, 1, 0, 0, 0), dt(2020, 6, 30, 23, 59, 59));
        let slices = split_months(&p, &[dec!(100)]).unwrap();

        assert_eq!(slices.len(), 3);
        assert_eq!(
            single_amounts(&slices),
            vec![dec!(32.97), dec!(34.07), dec!(32.96)]
        );
    }

    #[test]
    fn test_split_full_year() {
        let p = period(dt(2021, 5, 1, 0, 0, 0), dt(2022, 4, 30, 0, 0, 0));
        let slices = split_months(&p, &[dec!(100.00)]).unwrap();

        assert_eq!(slices.len(), 12);
        assert_eq!(
            single_amounts(&slices),
            vec![
                dec!(8.52),
                dec!(8.24),
                dec!(8.52),
                dec!(8.52),
                dec!(8.24),
                dec!(8.52),
                dec!(8.24),
                dec!(8.52),
                dec!(8.52),
                dec!(7.69),
                dec!(8.52),
                dec!(7.95),
            ]
        );

        // Middle slices cover whole months, boundary slices are clamped to
        // the period.
        assert_eq!(slices[0].start, p.start);
        assert_eq!(slices[0].end, dt(2021, 5, 31, 23, 59, 59));
        assert_eq!(slices[6].start, dt(2021, 11, 1, 0, 0, 0));
        assert_eq!(slices[11].end, p.end);
    }

    #[test]
    fn test_split_negative_amount() {
        let p = period(dt(2022, 11, 15, 17, 3, 22), dt(2023, 8, 16, 11, 52, 12));
        let slices = split_months(&p, &[dec!(-14.11)]).unwrap();

        assert_eq!(slices.len(), 10);
        assert_eq!(slices[0].amounts[0], dec!(-0.79));
        assert_eq!(slices[9].amounts[0], dec!(-0.78));
        let sum: Decimal = single_amounts(&slices).iter().sum();
        assert_eq!(sum, dec!(-14.11));
    }

    #[test]
    fn test_point_period_passes_through() {
        let at = dt(2021, 6, 22, 14, 5, 0);
        let slices = split_months(&Period::instant(at), &[dec!(49.99)]).unwrap();
        assert_eq!(
            slices,
            vec![MonthSlice {
                start: at,
                end: at,
                amounts: vec![dec!(49.99)],
            }]
        );
    }

    #[test]
    fn test_single_month_returns_full_amount() {
        let p = period(dt(2021, 3, 5, 0, 0, 0), dt(2021, 3, 20, 23, 59, 59));
        let slices = split_months(&p, &[dec!(42.00)]).unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].amounts[0], dec!(42.00));
    }

    #[test]
    fn test_trailing_zero_slice_is_dropped() {
        // Ends exactly on the next month boundary: the second month's share
        // rounds to zero and the correction keeps it there.
        let p = period(dt(2021, 1, 1, 0, 0, 0), dt(2021, 2, 1, 0, 0, 0));
        let slices = split_months(&p, &[dec!(100.00)]).unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].amounts[0], dec!(100.00));
    }

    #[test]
    fn test_parallel_amounts_share_weights() {
        let p = period(dt(2021, 1, 15, 0, 0, 0), dt(2021, 3, 14, 23, 59, 59));
        let slices = split_months(&p, &[dec!(100.00), dec!(119.00)]).unwrap();

        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].amounts, vec![dec!(28.81), dec!(34.29)]);
        assert_eq!(slices[1].amounts, vec![dec!(47.46), dec!(56.47)]);
        assert_eq!(slices[2].amounts, vec![dec!(23.73), dec!(28.24)]);

        for idx in 0..2 {
            let sum: Decimal = slices.iter().map(|s| s.amounts[idx]).sum();
            assert_eq!(sum, [dec!(100.00), dec!(119.00)][idx]);
        }
    }

    #[test]
    fn test_sum_invariant_over_awkward_inputs() {
        let cases = [
            (dt(2021, 1, 1, 0, 0, 0), dt(2021, 12, 31, 23, 59, 59), dec!(0.01)),
            (dt(2021, 1, 31, 23, 0, 0), dt(2021, 2, 1, 1, 0, 0), dec!(999.99)),
            (dt(2020, 2, 1, 0, 0, 0), dt(2020, 3, 31, 23, 59, 59), dec!(33.33)),
            (dt(2021, 6, 10, 8, 30, 0), dt(2024, 6, 9, 8, 29, 59), dec!(1234.56)),
        ];
        for (start, end, amount) in cases {
            let slices = split_months(&period(start, end), &[amount]).unwrap();
            let sum: Decimal = single_amounts(&slices).iter().sum();
            assert_eq!(sum, amount, "sum drifted for {} - {}", start, end);
        }
    }

    #[test]
    fn test_recognized_month_accounting_date() {
        use crate::schema::{AccountingProps, LineItem, RevenueType};

        let item = RevenueItem {
            id: "in_1".to_string(),
            number: Some("INV-100".to_string()),
            text: "Invoice INV-100".to_string(),
            created: dt(2021, 11, 2, 0, 0, 0),
            amount_net: dec!(100.00),
            amount_with_tax: dec!(100.00),
            accounting_props: AccountingProps {
                customer_account: "10001".to_string(),
                revenue_account: "8338".to_string(),
                tax_key: None,
                vat_id: None,
                country_region: "EU".to_string(),
            },
            line_items: vec![LineItem {
                index: 1,
                text: "Invoice INV-100 / Subscription".to_string(),
                period: period(dt(2021, 11, 1, 0, 0, 0), dt(2022, 1, 31, 23, 59, 59)),
                amount_net: dec!(100.00),
                amount_with_tax: dec!(100.00),
            }],
            reversal: None,
            is_recurring: true,
            revenue_type: RevenueType::Prepaid,
        };

        let rows = recognized_month_rows(&[item.clone()]).unwrap();
        assert_eq!(rows.len(), 3);
        // 2021 months book on the invoice date, the 2022 month on Jan 1st.
        assert_eq!(rows[0].accounting_date, item.created);
        assert_eq!(rows[1].accounting_date, item.created);
        assert_eq!(rows[2].accounting_date, dt(2022, 1, 1, 0, 0, 0));
        let total: Decimal = rows.iter().map(|r| r.amount_net).sum();
        assert_eq!(total, dec!(100.00));
    }
}
