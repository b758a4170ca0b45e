pub mod comparator;
pub mod copier;
pub mod error;
pub mod journal;
pub mod reconciler;
pub mod report;
pub mod scanner;

pub use comparator::{FileComparator, FileRelation};
pub use copier::{copy_entry, remove_entry};
pub use error::SyncError;
pub use journal::{ActionLog, ActionSink, LogRecord};
pub use reconciler::{prune_gate, Reconciler};
pub use report::PassReport;
pub use scanner::find_stale_entries;
