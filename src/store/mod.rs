//! Detection record store.
//!
//! Two CSV ledgers: active detections and archived repairs. Ids are unique
//! across both and never reused.

mod ledger;
mod query;
mod record;
mod record_store;
mod report;
mod stats;

pub use query::{DetectionFilter, is_all, sort_by_confidence_desc};
pub use record::{Category, ConfidenceBand, DetectionRecord, RepairRecord, title_case};
pub use record_store::{RecordStore, StorePaths};
pub use report::{default_report_name, write_report};
pub use stats::{DetectionStats, compute_stats};
