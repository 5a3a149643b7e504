//! Core domain types for the bank/GL reconciliation pipeline.
//!
//! This crate holds only data and the invariants that are cheap to enforce on the types
//! themselves (status transitions, monotonic counters, uniqueness keys). The components that
//! operate on these types — matchers, scorer, orchestrator, stores — live in sibling crates.

pub mod candidate;
pub mod cursor;
pub mod entity;
pub mod gl;
pub mod ids;
pub mod money;
pub mod pattern;
pub mod transaction;

pub use candidate::{Candidate, Policy, Tier};
pub use cursor::{CursorStatus, SyncCursor};
pub use entity::{Entity, EntityMap};
pub use gl::{GlAccountType, GlEntry};
pub use ids::{
    BalanceId, EntityKey, GlLineId, GlTransactionId, PatternId, ProfileId, Reference,
    SubsidiaryId, SuggestionId,
};
pub use money::{CurrencyCode, Money, Rate};
pub use pattern::{Pattern, PatternKind, TargetKind};
pub use transaction::{
    BankTransaction, CardInfo, Direction, FxInfo, TransactionKind, TxStatus,
};
