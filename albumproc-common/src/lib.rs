//! # albumproc common library
//!
//! Shared code for the album archive processor:
//! - Error and result types
//! - TOML bootstrap configuration and config-file discovery
//! - Tracing initialization with a size-rotating log file
//! - Human-readable formatting of byte counts and elapsed time

pub mod config;
pub mod error;
pub mod human;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
