//! # MoodTune Common Library
//!
//! Shared code for the MoodTune crates:
//! - Error types
//! - Configuration loading (TOML file, environment, compiled defaults)

pub mod config;
pub mod error;

pub use error::{Error, Result};
