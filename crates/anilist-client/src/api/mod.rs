//! AniList GraphQL API client implementation.
//!
//! This module provides a rate-limited, retry-enabled client for the AniList
//! GraphQL API, built on a pluggable transport.

pub mod client;
pub mod error;
pub mod rate_limiter;
pub mod transport;
pub mod types;

pub use client::{AniListClient, ClientOptions, DEFAULT_BASE_URL};
pub use error::ClientError;
pub use rate_limiter::{RateLimiter, DEFAULT_REQUESTS_PER_MINUTE};
pub use transport::{GraphQlTransport, HttpTransport};
pub use types::*;
