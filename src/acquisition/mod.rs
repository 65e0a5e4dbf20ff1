//! Acquisition: conditional favicon fetching, normalization and storage

pub mod decode;
pub mod fetcher;
pub mod orchestrator;
pub mod policy;
pub mod storage;

pub use fetcher::{FetchResponse, HttpIconFetcher, IconFetcher};
pub use orchestrator::{AcquisitionOrchestrator, AcquisitionSummary, EntryOutcome};
pub use policy::{CacheDecision, CachePolicy};
pub use storage::IconStorage;
