//! # moodpost Common Library
//!
//! Shared code for the moodpost workspace:
//! - Error type used by configuration and text helpers
//! - TOML bootstrap configuration model and file resolution
//! - Text normalisation shared by providers and deduplication

pub mod config;
pub mod error;
pub mod text;

pub use error::{Error, Result};
