//! Shared library for the AniList client toolkit.
//!
//! This crate provides common functionality used across the workspace:
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;

// Re-export commonly used types
pub use config::{AniListConfig, Config, LoggingConfig, RateLimitConfig};
pub use logging::LogConfig;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
