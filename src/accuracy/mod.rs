//! Registration accuracy evaluation over batches of identifiers.

pub mod aggregator;
pub mod record;
pub mod source;
pub mod table;

pub use aggregator::{read_identifier_list, summarize, AccuracyAggregator};
pub use record::{AccuracyRecord, Outcome, Status, Summary, SENTINEL};
pub use source::{CorrespondenceSource, InMemorySource, NpyMatchStore};
pub use table::AccuracyTable;
