//! In-memory catalogue keyed by domain, with whole-file JSON persistence

use std::collections::HashMap;
use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::models::CatalogueEntry;
use crate::utils::fs::write_atomic;

/// Ordered catalogue with a stable `domain -> position` index
///
/// Both subsystems write through this single store instead of holding
/// aliases into filtered views of it.
#[derive(Debug, Clone, Default)]
pub struct CatalogueStore {
    entries: Vec<CatalogueEntry>,
    by_domain: HashMap<String, usize>,
}

impl CatalogueStore {
    /// Build a store, recomputing every `domain` from its `url`
    ///
    /// Later records whose domain is already present are dropped with a
    /// warning. Records whose URL has no host are kept but not indexed.
    pub fn from_entries(entries: Vec<CatalogueEntry>) -> Self {
        let mut store = Self {
            entries: Vec::with_capacity(entries.len()),
            by_domain: HashMap::with_capacity(entries.len()),
        };

        for mut entry in entries {
            if !entry.refresh_domain() {
                warn!("Catalogue record has no usable host: {}", entry.url);
                entry.domain.clear();
                store.entries.push(entry);
                continue;
            }
            if store.by_domain.contains_key(&entry.domain) {
                warn!(
                    "Duplicate domain {} in catalogue (url {}), keeping first occurrence",
                    entry.domain, entry.url
                );
                continue;
            }
            store
                .by_domain
                .insert(entry.domain.clone(), store.entries.len());
            store.entries.push(entry);
        }

        store
    }

    /// Load a catalogue that must exist
    pub async fn load(path: &Path) -> AppResult<Self> {
        Ok(Self::from_entries(read_entries(path).await?))
    }

    /// Load a catalogue, treating a missing file as empty
    pub async fn load_or_default(path: &Path) -> AppResult<Self> {
        if fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            debug!("No catalogue state at {}, starting empty", path.display());
            Ok(Self::default())
        }
    }

    pub async fn save(&self, path: &Path) -> AppResult<()> {
        write_entries_atomic(path, &self.entries).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogueEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<CatalogueEntry> {
        self.entries
    }

    pub fn get(&self, domain: &str) -> Option<&CatalogueEntry> {
        self.by_domain.get(domain).map(|&i| &self.entries[i])
    }

    /// Mutate the entry for `domain` in place; returns false if absent
    pub fn update<F>(&mut self, domain: &str, f: F) -> bool
    where
        F: FnOnce(&mut CatalogueEntry),
    {
        match self.by_domain.get(domain) {
            Some(&i) => {
                f(&mut self.entries[i]);
                true
            }
            None => false,
        }
    }

    /// Consume the store into a `domain -> entry` map
    pub fn into_domain_map(self) -> HashMap<String, CatalogueEntry> {
        self.entries
            .into_iter()
            .filter(|e| !e.domain.is_empty())
            .map(|e| (e.domain.clone(), e))
            .collect()
    }
}

/// Read a JSON array of catalogue records
///
/// A missing file is a configuration failure: nothing can be processed.
pub async fn read_entries(path: &Path) -> AppResult<Vec<CatalogueEntry>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::configuration(format!(
                "required input file not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Replace `path` with the serialized entries in one rename
///
/// The document is fully serialized before the temp file is created, and
/// the temp file lives in the destination directory so the final rename
/// never crosses filesystems.
pub async fn write_entries_atomic(path: &Path, entries: &[CatalogueEntry]) -> AppResult<()> {
    let bytes = serde_json::to_vec(entries)?;
    write_atomic(path, bytes).await?;
    debug!("Wrote {} catalogue entries to {}", entries.len(), path.display());
    Ok(())
}
