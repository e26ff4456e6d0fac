//! Core types and shared functionality for prts-sync.
//!
//! This crate provides:
//! - Normalized record types for roster, detail and glossary data
//! - SQLite storage sink
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod model;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use model::{
    BaseAttributes, DetailRecord, ExtraAttributes, ExtraField, GlossaryTerm, RosterEntry, Skill, SkillLevel,
    StaticTerm, Talent, TalentDetail, TalentType, Tier,
};
pub use store::OperatorDb;
