//! Evidence collection and aggregation.

pub mod aggregator;
pub mod collector;

pub use aggregator::aggregate;
pub use collector::{dispatch_collectors, settle_record, CollectorSet, EvidenceCollector};
