//! # icdkg Common Library
//!
//! Shared code for the icdkg crates including:
//! - Error type used across crates
//! - Configuration loading (CLI → ENV → TOML → defaults)
//! - Tracing subscriber setup
//! - Case storage (SQLite, optional sink)

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
