//! AniList client library.
//!
//! This library provides a typed client for the AniList GraphQL API and a
//! FIFO rate limiter that keeps any number of concurrent callers within one
//! requests-per-minute budget.

pub mod api;

pub use api::{
    AniListClient, ClientError, ClientOptions, GraphQlTransport, HttpTransport, RateLimiter,
};
