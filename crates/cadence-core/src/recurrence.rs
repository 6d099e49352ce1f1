//! Recurrence expansion strategies.
//!
//! Each [`RecurrenceKind`] maps onto one lazy, ordered, infinite sequence of
//! calendar dates, dispatched by exhaustive `match` so an unhandled kind is a
//! compile error rather than a runtime lookup miss. Legacy numeric type codes
//! are translated at the boundary by [`RecurrenceKind::from_type_code`].
//!
//! All sequences stay aligned to the rule's `start_date` grid and yield only
//! dates at or after the requested reference date. Expansion is total: a rule
//! that passes validation always yields dates, never skips silently.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::calendar;
use crate::error::CoreError;
use crate::models::{RecurrenceKind, RecurrenceRule};

/// Returns the infinite date sequence for `rule`, starting at or after
/// `from`. Fails with `InvalidRuleParameter` for out-of-domain rule fields.
pub fn occurrence_dates(
    rule: &RecurrenceRule,
    from: NaiveDate,
) -> Result<Box<dyn Iterator<Item = NaiveDate>>, CoreError> {
    rule.validate()?;
    let interval = i64::from(rule.interval);

    let dates: Box<dyn Iterator<Item = NaiveDate>> = match rule.kind {
        RecurrenceKind::Daily => Box::new(daily(rule.start_date, interval, from)),
        RecurrenceKind::Weekly => Box::new(weekly(
            rule.start_date,
            rule.effective_weekday(),
            interval,
            from,
        )),
        RecurrenceKind::MonthlyOnDay => {
            let day = u32::from(required(rule.day_of_month, "day_of_month")?);
            Box::new(monthly(rule.start_date, interval, from, move |year, month| {
                calendar::clamp_day_of_month(year, month, day)
            }))
        }
        RecurrenceKind::MonthlyOnWeekday => {
            let weekday = Weekday::from(required(rule.weekday, "weekday")?);
            let ordinal = required(rule.ordinal, "ordinal")?;
            Box::new(monthly(rule.start_date, interval, from, move |year, month| {
                calendar::nth_weekday_of_month(year, month, weekday, ordinal)
            }))
        }
        RecurrenceKind::AnnualOnDay => {
            let month = u32::from(required(rule.month, "month")?);
            let day = u32::from(required(rule.day_of_month, "day_of_month")?);
            Box::new(annual(rule.start_date, interval, from, move |year| {
                calendar::clamp_day_of_month(year, month, day)
            }))
        }
        RecurrenceKind::AnnualOnWeekday => {
            let month = u32::from(required(rule.month, "month")?);
            let weekday = Weekday::from(required(rule.weekday, "weekday")?);
            let ordinal = required(rule.ordinal, "ordinal")?;
            Box::new(annual(rule.start_date, interval, from, move |year| {
                calendar::nth_weekday_of_month(year, month, weekday, ordinal)
            }))
        }
    };

    Ok(dates)
}

fn required<T>(field: Option<T>, name: &str) -> Result<T, CoreError> {
    field.ok_or_else(|| {
        CoreError::InvalidRuleParameter(format!("{} is required for this kind", name))
    })
}

/// Infinite arithmetic progression of period indices anchored at
/// `start_index`, stepping `step`, starting at the first grid point at or
/// after `from_index`.
fn aligned_periods(start_index: i64, step: i64, from_index: i64) -> impl Iterator<Item = i64> {
    let elapsed = from_index - start_index;
    let k = if elapsed <= 0 {
        0
    } else {
        (elapsed + step - 1) / step
    };
    std::iter::successors(Some(start_index + k * step), move |index| {
        Some(index + step)
    })
}

fn day_index(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn daily(start: NaiveDate, interval: i64, from: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    aligned_periods(day_index(start), interval, day_index(from))
        .map(move |index| start + Duration::days(index - day_index(start)))
}

fn weekly(
    start: NaiveDate,
    weekday: Weekday,
    interval: i64,
    from: NaiveDate,
) -> impl Iterator<Item = NaiveDate> {
    // First date at or after start that falls on the rule's weekday.
    let ahead =
        (weekday.num_days_from_monday() + 7 - start.weekday().num_days_from_monday()) % 7;
    let anchor = start + Duration::days(i64::from(ahead));
    daily(anchor, interval * 7, from)
}

fn monthly(
    start: NaiveDate,
    interval: i64,
    from: NaiveDate,
    resolve: impl Fn(i32, u32) -> NaiveDate + 'static,
) -> impl Iterator<Item = NaiveDate> {
    // The resolved day within the first aligned month may still precede
    // `from`; skip_while trims only that head.
    aligned_periods(month_index(start), interval, month_index(from))
        .map(move |index| {
            let year = index.div_euclid(12) as i32;
            let month = index.rem_euclid(12) as u32 + 1;
            resolve(year, month)
        })
        .skip_while(move |date| *date < from)
}

fn annual(
    start: NaiveDate,
    interval: i64,
    from: NaiveDate,
    resolve: impl Fn(i32) -> NaiveDate + 'static,
) -> impl Iterator<Item = NaiveDate> {
    aligned_periods(i64::from(start.year()), interval, i64::from(from.year()))
        .map(move |year| resolve(year as i32))
        .skip_while(move |date| *date < from)
}
