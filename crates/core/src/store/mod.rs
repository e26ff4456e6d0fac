//! SQLite storage sink for roster, detail and glossary records.
//!
//! Writes come in two shapes:
//!
//! - upserts keyed by the subject name (`operator_base`) or term name
//!   (`global_terms`)
//! - replace writes (delete then bulk insert, in one transaction) for the
//!   per-subject child tables, so syncing a subject twice is idempotent

pub mod connection;
pub mod migrations;
pub mod operators;
pub mod terms;

pub use crate::Error;

pub use connection::OperatorDb;
pub use operators::DetailSummary;
