//! Study-time tracking core.
//!
//! Raw study sessions are persisted to a SQLite-backed store, a denormalized
//! per-(user, subject, day) summary table is maintained incrementally, and
//! daily/weekly/monthly series plus streak counts are derived on demand for
//! chart rendering. Presentation code talks to [`ChartQueries`] and
//! [`TimeRecorder`]; [`SummaryBackfill`] reconciles historical raw records
//! into the summary store.

pub mod aggregate;
pub mod calendar;
pub mod charts;
pub mod db;
mod error;
pub mod identity;
pub mod migrate;
pub mod recorder;

pub use aggregate::Aggregator;
pub use charts::{ChartQueries, PeriodWindow, SeriesPoint, ViewMode};
pub use db::models::{DailySummary, DailyTotal, PeriodSummary, StudySession, Subject};
pub use db::Database;
pub use error::StudyError;
pub use identity::{IdentityProvider, StaticIdentity};
pub use migrate::{MigrationReport, SummaryBackfill};
pub use recorder::TimeRecorder;
