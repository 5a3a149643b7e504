//! Authenticated client for the bank API (C1): profile/balance listing, per-balance statement
//! fetches, and the stateful two-step SCA handshake that statement fetches require (§4.1).
//!
//! The handshake session and the per-profile rate limiter are scoped resources owned by
//! [`BankClient`] and handed to callers by reference, never reached through process globals
//! (§9 "global state"). Mapping the bank's wire shapes into [`recon_model::BankTransaction`]
//! is deliberately left to `recon_ingestion`, which is the only crate that needs to know both
//! the bank's schema and the domain model.

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod session;
pub mod signing;
pub mod types;

pub use client::{BankClient, MAX_STATEMENT_WINDOW_DAYS};
pub use error::{BankError, BankResult};
pub use rate_limit::ProfileRateLimiter;
pub use session::{Session, SessionCache};
pub use types::{Balance, Profile, Statement, StatementCard, StatementFx, StatementTransaction};
