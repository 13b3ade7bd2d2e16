//! Shared utilities and common types for the entries export backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Hashing helpers (request ids, API key digests)
//! - HMAC nonces protecting the export actions
//! - Text, key and file name sanitizers
//! - Step/offset arithmetic for chunked exports
//! - Common validation logic

pub mod crypto;
pub mod nonce;
pub mod pagination;
pub mod sanitize;
pub mod validation;
