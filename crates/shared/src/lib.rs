//! Shared utilities and common types for the plug monitor.
//!
//! This crate provides common functionality used across all other crates:
//! - Time truncation and aggregation window arithmetic
//! - Common validation logic

pub mod time;
pub mod validation;
