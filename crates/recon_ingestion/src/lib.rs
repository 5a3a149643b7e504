//! Ingestion & Cursor Store (C2, §4.2): per-(profile, currency) incremental sync, mapping the
//! bank's wire shapes into the domain model and upserting them into the transaction table.

pub mod error;
pub mod ingest;
pub mod mapping;

pub use error::{IngestionError, IngestionResult};
pub use ingest::{Ingestor, SyncOutcome, SYNC_OVERLAP};
pub use mapping::map_transaction;
