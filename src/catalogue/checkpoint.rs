//! Periodic full-catalogue checkpoints for acquisition runs
//!
//! A run only touches a slice of the catalogue, yet every checkpoint must
//! be a complete state file. The writer therefore keeps three layers and
//! merges them on every flush: this run's results, the previously persisted
//! state, and the bare input records.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info};

use super::store::write_entries_atomic;
use crate::errors::AppResult;
use crate::models::CatalogueEntry;

pub struct CheckpointWriter {
    path: PathBuf,
    inputs: Vec<CatalogueEntry>,
    prior: HashMap<String, CatalogueEntry>,
    /// Results computed this run, keyed by position in `inputs`
    fresh: HashMap<usize, CatalogueEntry>,
    interval: usize,
    since_flush: usize,
    flushes: usize,
}

impl CheckpointWriter {
    pub fn new(
        path: impl Into<PathBuf>,
        inputs: Vec<CatalogueEntry>,
        prior: HashMap<String, CatalogueEntry>,
        interval: usize,
    ) -> Self {
        Self {
            path: path.into(),
            inputs,
            prior,
            fresh: HashMap::new(),
            interval: interval.max(1),
            since_flush: 0,
            flushes: 0,
        }
    }

    /// Starting point for processing the input at `position`: the bare
    /// record overlaid with any persisted state for its domain
    pub fn seed(&self, position: usize) -> CatalogueEntry {
        let bare = &self.inputs[position];
        CatalogueEntry::merge_layers(bare, self.prior_for(bare), None)
    }

    /// Record this run's result for one input; returns true when a flush is due
    pub fn record(&mut self, position: usize, entry: CatalogueEntry) -> bool {
        self.fresh.insert(position, entry);
        self.since_flush += 1;
        self.since_flush >= self.interval
    }

    pub fn pending(&self) -> usize {
        self.since_flush
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Full-length merged view, one record per input in input order
    pub fn snapshot(&self) -> Vec<CatalogueEntry> {
        self.inputs
            .iter()
            .enumerate()
            .map(|(position, bare)| {
                CatalogueEntry::merge_layers(bare, self.prior_for(bare), self.fresh.get(&position))
            })
            .collect()
    }

    /// Rewrite the state file with the merged catalogue
    pub async fn flush(&mut self) -> AppResult<()> {
        let snapshot = self.snapshot();
        write_entries_atomic(&self.path, &snapshot).await?;
        self.flushes += 1;
        debug!(
            "Checkpoint {} written: {} entries ({} fresh this run, {} since last checkpoint)",
            self.flushes,
            snapshot.len(),
            self.fresh.len(),
            self.since_flush
        );
        self.since_flush = 0;
        Ok(())
    }

    /// Final flush; the accumulator is discarded afterwards
    pub async fn finish(mut self) -> AppResult<Vec<CatalogueEntry>> {
        self.flush().await?;
        info!(
            "Final checkpoint written to {} after {} flushes",
            self.path.display(),
            self.flushes
        );
        Ok(self.snapshot())
    }

    fn prior_for(&self, bare: &CatalogueEntry) -> Option<&CatalogueEntry> {
        if bare.domain.is_empty() {
            None
        } else {
            self.prior.get(&bare.domain)
        }
    }
}
