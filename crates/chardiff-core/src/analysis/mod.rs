//! Priority and significance scoring over detected changes.

pub mod priority;
pub mod significance;

pub use priority::{PriorityAnalyzer, PriorityBreakdown};
pub use significance::{SignificanceAnalyzer, SignificanceBreakdown, SignificanceSummary};
