//! Entry Store: the catalogue data set and its crash-safe persistence

pub mod checkpoint;
pub mod store;

pub use checkpoint::CheckpointWriter;
pub use store::{read_entries, write_entries_atomic, CatalogueStore};
