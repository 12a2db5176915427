pub mod session;
pub mod subject;
pub mod summary;

pub use session::StudySession;
pub use subject::Subject;
pub use summary::{DailySummary, DailyTotal, PeriodSummary};
