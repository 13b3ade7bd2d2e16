//! Persistence layer for the entries export backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations backing the export storage traits

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
