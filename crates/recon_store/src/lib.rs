//! Repository traits backing C13 persistence: [`TransactionStore`], [`CursorStore`],
//! [`PatternStore`], [`LeaseStore`]. Each ships an in-memory implementation used by unit and
//! integration tests across the workspace and wired by `recon_node` at startup; a durable
//! Postgres-backed store (§4.13) would satisfy the same `async_trait` contracts without any
//! caller-visible change. See DESIGN.md for why no such backend is wired in this port.

pub mod cursor_store;
pub mod error;
pub mod learning_cursor_store;
pub mod lease_store;
pub mod pattern_store;
pub mod transaction_store;

pub use cursor_store::{CursorKey, CursorStore, InMemoryCursorStore};
pub use error::{StoreError, StoreResult};
pub use learning_cursor_store::{InMemoryLearningCursorStore, LearningCursorStore};
pub use lease_store::{InMemoryLeaseStore, LeaseStore, LeaseToken};
pub use pattern_store::{InMemoryPatternStore, PatternStore};
pub use transaction_store::{InMemoryTransactionStore, TransactionStore};
