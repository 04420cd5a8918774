use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

/// First wall-clock instant (00:00:00) of the month containing `at`.
pub fn month_start(at: NaiveDateTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(at.year(), at.month(), 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Last wall-clock instant (23:59:59) of the month containing `at`.
pub fn month_end(at: NaiveDateTime) -> NaiveDateTime {
    last_day_of_month(at.year(), at.month())
        .and_hms_opt(23, 59, 59)
        .unwrap()
}

/// 00:00:00 on the first day of the month after the one containing `at`.
pub fn next_month_start(at: NaiveDateTime) -> NaiveDateTime {
    month_end(at) + chrono::Duration::seconds(1)
}

/// Shifts a date by whole calendar months, clamping the day to the target
/// month's length (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let zero_based = date.year() * 12 + date.month() as i32 - 1 + months;
    let year = zero_based.div_euclid(12);
    let month = zero_based.rem_euclid(12) as u32 + 1;
    let day = date.day().min(last_day_of_month(year, month).day());
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}
