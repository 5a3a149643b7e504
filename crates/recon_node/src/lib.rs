//! Scheduler & Process Wiring (C10, §4.10): the single binary that owns the clock, session
//! cache, GL cache, and pattern index, and drives ingestion, orchestration, and learning on
//! their configured cadences.

pub mod cadence;
pub mod directory;
pub mod scheduler;
pub mod slack;
pub mod wiring;

pub use directory::{DirectoryError, EntityDirectory};
pub use slack::SlackNotifier;
pub use wiring::{Node, SyncTarget, WiringError};
