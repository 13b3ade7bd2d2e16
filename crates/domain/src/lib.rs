//! Domain layer for the entries export backend.
//!
//! This crate contains:
//! - Domain models (forms, entries, export arguments, request descriptors)
//! - The export error taxonomy and localized strings
//! - Row materialization and the storage/extension seams it depends on

pub mod errors;
pub mod i18n;
pub mod models;
pub mod services;

pub use errors::{ExportError, COMMON_ERROR};
