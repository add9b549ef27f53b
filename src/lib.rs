//! Stockfolio Library
//!
//! Exposes the cache, data clients and CLI types for the binary and for
//! integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod format;
