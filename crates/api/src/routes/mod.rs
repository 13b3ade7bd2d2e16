//! HTTP route handlers.

pub mod export;
pub mod health;
