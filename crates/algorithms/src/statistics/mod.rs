//! Statistical summaries of feature attributes
//!
//! - **summary**: mean, median and standard deviation of numeric fields

pub mod summary;

pub use summary::{numeric_statistics, NumericStatistics, NumericSummarizer};
