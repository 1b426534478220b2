//! # playlog common library
//!
//! Shared code for the playlog services:
//! - Error type shared by database and configuration code
//! - TOML configuration model and root folder resolution
//! - SQLite initialization and schema
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
