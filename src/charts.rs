//! Chart/query façade: the single entry point presentation code calls for
//! review-page data. Pure routing and shaping; every fold lives in
//! [`crate::aggregate`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{FixedOffset, Local, NaiveDate, Offset, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregator;
use crate::calendar;
use crate::db::Database;
use crate::error::StudyError;
use crate::identity::IdentityProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    Day,
    Week,
    Month,
}

impl ViewMode {
    /// Parse from a query-string parameter.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "day" => Some(ViewMode::Day),
            "week" => Some(ViewMode::Week),
            "month" => Some(ViewMode::Month),
            _ => None,
        }
    }
}

/// Caller-supplied date range: the selected month for day/week views, the
/// selected year for the month view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One chart bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub key: String,
    pub total_time: u64,
}

/// Orders responses by request issue order. A result is delivered only if
/// nothing newer has delivered before it, so a slow query superseded by a
/// faster one can never overwrite the newer data.
struct RequestLedger {
    issued: AtomicU64,
    delivered: AtomicU64,
}

impl RequestLedger {
    fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
        }
    }

    fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn deliver(&self, ticket: u64) -> bool {
        let mut latest = self.delivered.load(Ordering::SeqCst);
        loop {
            if ticket <= latest {
                return false;
            }
            match self.delivered.compare_exchange(
                latest,
                ticket,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(observed) => latest = observed,
            }
        }
    }
}

pub struct ChartQueries {
    aggregator: Aggregator,
    identity: Arc<dyn IdentityProvider>,
    offset: FixedOffset,
    ledger: RequestLedger,
}

impl ChartQueries {
    pub fn new(db: Database, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_offset(db, identity, Local::now().offset().fix())
    }

    pub fn with_offset(
        db: Database,
        identity: Arc<dyn IdentityProvider>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(db),
            identity,
            offset,
            ledger: RequestLedger::new(),
        }
    }

    /// Chart-ready series for the current user. Returns `Ok(None)` when the
    /// response was superseded by a newer request; the caller discards it.
    pub async fn series(
        &self,
        mode: ViewMode,
        window: PeriodWindow,
        subject_id: Option<&str>,
    ) -> Result<Option<Vec<SeriesPoint>>, StudyError> {
        let user_id = self.current_user()?;
        let ticket = self.ledger.begin();

        let points = match mode {
            ViewMode::Day => {
                let days = match subject_id {
                    Some(subject_id) => {
                        self.aggregator
                            .daily_for_subject(&user_id, subject_id, window.start, window.end)
                            .await?
                    }
                    None => {
                        self.aggregator
                            .daily_all_subjects(&user_id, window.start, window.end)
                            .await?
                    }
                };
                days.into_iter()
                    .map(|day| SeriesPoint {
                        key: calendar::day_key(day.date),
                        total_time: day.total_time,
                    })
                    .collect()
            }
            ViewMode::Week => {
                let weeks = self
                    .aggregator
                    .weekly_summaries(&user_id, window.start, window.end, subject_id)
                    .await?;
                weeks
                    .into_iter()
                    .map(|week| SeriesPoint {
                        key: week.period_key,
                        total_time: week.total_time,
                    })
                    .collect()
            }
            ViewMode::Month => {
                let months = self
                    .aggregator
                    .monthly_summaries(&user_id, window.start, window.end, subject_id)
                    .await?;
                months
                    .into_iter()
                    .map(|month| SeriesPoint {
                        key: month.period_key,
                        total_time: month.total_time,
                    })
                    .collect()
            }
        };

        if self.ledger.deliver(ticket) {
            Ok(Some(points))
        } else {
            debug!("Dropping superseded chart series response (ticket {ticket})");
            Ok(None)
        }
    }

    /// Subject ids with recorded data, for the filter dropdown.
    pub async fn subjects_with_data(&self) -> Result<Vec<String>, StudyError> {
        let user_id = self.current_user()?;
        self.aggregator.subjects_with_data(&user_id).await
    }

    /// Streak ending today (viewer-local).
    pub async fn consecutive_day_streak(&self) -> Result<u32, StudyError> {
        let user_id = self.current_user()?;
        let today = calendar::local_day(Utc::now(), self.offset);
        self.aggregator
            .consecutive_day_streak(&user_id, today)
            .await
    }

    fn current_user(&self) -> Result<String, StudyError> {
        self.identity
            .current_user_id()
            .ok_or(StudyError::NotAuthenticated)
    }
}
