//! ndlog - append-only NDJSON log file writer with age-based rotation
//!
//! This library provides the log writer, its rotation policy, and the
//! configuration that locates the log file.

pub mod config;
pub mod logging;
