//! Common error types for tanuki-proxy.
//!
//! This module provides a centralized Error enum using thiserror, with
//! conversions from underlying error types used throughout the crate.
//! Wire-level submission errors (the numeric codes the miner sees) are a
//! separate type in `proxy`, since they are part of the protocol surface
//! rather than internal failures.

use thiserror::Error;

/// Main error type for tanuki-proxy operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from tokio or std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream pool communication errors
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API errors
    #[error("API error: {0}")]
    Api(String),

    /// Generic errors for development
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
