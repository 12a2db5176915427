//! Calendar bucket keys.
//!
//! Pure, total functions mapping calendar days to the string keys used to
//! group summaries. Keys are zero-padded so lexicographic order matches
//! chronological order.
//!
//! Timezone contract: timestamps are resolved to calendar days with
//! [`local_day`] using the viewer's UTC offset, captured once by the calling
//! component. Every bucketing decision in the crate, streaks included, uses
//! that local day.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

/// `YYYY-MM-DD`
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `YYYY-Www` per ISO-8601: weeks run Monday through Sunday and week 1 is
/// the week containing the year's first Thursday. Late-December days can key
/// into week 1 of the next year, early-January days into the last week of
/// the previous year.
pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// `YYYY-MM`
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Calendar day of `timestamp` as seen from `offset`.
pub fn local_day(timestamp: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    timestamp.with_timezone(&offset).date_naive()
}
