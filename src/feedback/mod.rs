//! Feedback and dataset collection.
//!
//! Clients report whether streamed predictions were right and may offer
//! labelled landmark sequences for retraining. Both are kept in memory and
//! optionally appended to JSON Lines files.

pub mod store;

// Re-export commonly used types
pub use store::{
    Confusion, DatasetEntry, DatasetExport, DatasetRecord, FeedbackError, FeedbackRecord,
    FeedbackRequest, FeedbackStore, FeedbackSummary, SharedFeedbackStore,
};
