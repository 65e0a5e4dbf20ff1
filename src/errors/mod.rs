//! Centralized error handling for favicon-atlas
//!
//! Per-entry failures (network, HTTP status, decode) are recorded on the
//! catalogue entry itself and never escape the per-entry boundary. Only
//! [`AppError`] values reach the top of a run, and of those only
//! configuration failures are expected in normal operation.
//!
//! # Error Categories
//!
//! - **Configuration Errors**: missing input files, invalid option values
//! - **Fetch Errors**: timeouts and transport failures while requesting an icon
//! - **Decode Errors**: malformed ICO containers or raster payloads
//!
//! # Usage
//!
//! ```rust
//! use favicon_atlas::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::configuration("catalogue file missing"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for icon fetch Results
pub type FetchResult<T> = Result<T, FetchError>;

/// Convenience type alias for icon decode Results
pub type DecodeResult<T> = Result<T, DecodeError>;
