// Time-series reconciliation and summaries
pub mod merger;
pub mod trend;

pub use merger::{discard_predictions, merge};
pub use trend::{summarize, TrendSummary};
