//! Error type definitions for favicon-atlas
//!
//! The hierarchy mirrors the two places failures can surface: the run as a
//! whole ([`AppError`]) and a single catalogue entry ([`FetchError`],
//! [`DecodeError`]).

use thiserror::Error;

/// Top-level application error type
///
/// Anything of this type aborts the current run.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors, including required input files that are missing
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State or sidecar (de)serialization failures
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image encoding failures while rendering tiles
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures while requesting an icon over the network
///
/// All variants are retryable across runs; none are retried within a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete within the configured timeout
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    /// Connection refused, DNS failure, reset mid-body and similar
    #[error("Network error: {url} - {message}")]
    TransientNetwork { url: String, message: String },

    /// The favicon reference could not be turned into an absolute URL
    #[error("Invalid URL: {url} - {message}")]
    InvalidUrl { url: String, message: String },
}

/// Failures while turning downloaded bytes into a normalized raster
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The ICO directory is malformed or empty
    #[error("Invalid ICO container: {message}")]
    Container { message: String },

    /// No decoder accepted the payload
    #[error("Undecodable image: {0}")]
    Raster(#[source] image::ImageError),

    /// Re-encoding the normalized raster failed
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error with a custom message
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error should abort a run before any entry is processed
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl FetchError {
    /// Create a timeout error
    pub fn timeout<U: Into<String>>(url: U) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create a transient network error
    pub fn network<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::TransientNetwork {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl DecodeError {
    /// Create a container error
    pub fn container<S: Into<String>>(message: S) -> Self {
        Self::Container {
            message: message.into(),
        }
    }
}
