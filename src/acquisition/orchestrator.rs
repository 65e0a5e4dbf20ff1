//! One acquisition pass over the ranked catalogue
//!
//! Entries are processed strictly in rank order, one at a time. Every
//! per-entry failure is recorded on the entry and the pass continues; only
//! configuration failures (a missing catalogue file) and state-file write
//! failures end the run.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use super::decode::normalize_icon;
use super::fetcher::{FetchResponse, IconFetcher};
use super::policy::{CacheDecision, CachePolicy};
use super::storage::IconStorage;
use crate::catalogue::{read_entries, CatalogueStore, CheckpointWriter};
use crate::config::Config;
use crate::errors::{AppResult, FetchError};
use crate::models::{CatalogueEntry, EntryStatus};
use crate::utils::domain::{resolve_favicon_url, url_suggests_ico};

/// Counters for one acquisition pass
#[derive(Debug, Clone, Default)]
pub struct AcquisitionSummary {
    pub catalogue_size: usize,
    pub processed: usize,
    pub network_requests: usize,
    pub downloaded_bytes: u64,
    pub checkpoints: usize,
    by_status: HashMap<EntryStatus, usize>,
}

impl AcquisitionSummary {
    pub fn count(&self, status: EntryStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    fn record(&mut self, status: EntryStatus) {
        *self.by_status.entry(status).or_default() += 1;
        self.processed += 1;
    }

    fn status_line(&self) -> String {
        EntryStatus::ALL
            .iter()
            .filter(|s| self.count(**s) > 0)
            .map(|s| format!("{}={}", s, self.count(*s)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct AcquisitionOrchestrator<F: IconFetcher> {
    fetcher: F,
    policy: CachePolicy,
    storage: IconStorage,
    icon_size: u32,
    max_entries: usize,
    checkpoint_interval: usize,
}

impl<F: IconFetcher> AcquisitionOrchestrator<F> {
    pub fn new(fetcher: F, config: &Config) -> Self {
        Self {
            fetcher,
            policy: CachePolicy::from_config(&config.acquisition),
            storage: IconStorage::new(&config.paths.icons_dir),
            icon_size: config.acquisition.icon_size,
            max_entries: config.acquisition.max_entries,
            checkpoint_interval: config.acquisition.checkpoint_interval,
        }
    }

    /// Run one pass and leave a full-length state file at `state_path`
    pub async fn run(&self, catalogue_path: &Path, state_path: &Path) -> AppResult<AcquisitionSummary> {
        let run_start = Instant::now();

        let inputs = CatalogueStore::from_entries(read_entries(catalogue_path).await?).into_entries();
        let prior = CatalogueStore::load_or_default(state_path)
            .await?
            .into_domain_map();
        info!(
            "Loaded {} catalogue entries from {} ({} with prior state)",
            inputs.len(),
            catalogue_path.display(),
            prior.len()
        );

        let order = processing_order(&inputs, self.max_entries);
        let total = order.len();
        let mut summary = AcquisitionSummary {
            catalogue_size: inputs.len(),
            ..AcquisitionSummary::default()
        };

        let mut writer = CheckpointWriter::new(state_path, inputs, prior, self.checkpoint_interval);
        info!(
            "Starting acquisition of {} entries (checkpoint every {})",
            total, self.checkpoint_interval
        );

        for position in order {
            let seed = writer.seed(position);
            let (updated, outcome) = self.process_entry(seed, Utc::now()).await;

            if outcome.network {
                summary.network_requests += 1;
            }
            summary.downloaded_bytes += outcome.bytes_written;
            summary.record(updated.status);
            debug!(
                "{} -> {}{}",
                updated.domain,
                updated.status,
                updated
                    .error
                    .as_deref()
                    .map(|e| format!(" ({e})"))
                    .unwrap_or_default()
            );

            if writer.record(position, updated) {
                writer.flush().await?;
                let elapsed = run_start.elapsed();
                info!(
                    "Acquisition progress: {}/{} ({:.1}%) requests={} {} elapsed={:?}",
                    summary.processed,
                    total,
                    summary.processed as f64 / total.max(1) as f64 * 100.0,
                    summary.network_requests,
                    summary.status_line(),
                    elapsed
                );
            }
        }

        let checkpoints_before_final = writer.flushes();
        writer.finish().await?;
        summary.checkpoints = checkpoints_before_final + 1;

        info!(
            "Acquisition completed: processed={} requests={} downloaded_bytes={} {} checkpoints={} duration={:?}",
            summary.processed,
            summary.network_requests,
            summary.downloaded_bytes,
            summary.status_line(),
            summary.checkpoints,
            run_start.elapsed()
        );
        Ok(summary)
    }

    /// Compute the new state of one entry
    ///
    /// `entry` is the prior state overlaid on the input record; untouched
    /// fields (including any tile assignment) carry through unchanged.
    pub async fn process_entry(
        &self,
        mut entry: CatalogueEntry,
        now: DateTime<Utc>,
    ) -> (CatalogueEntry, EntryOutcome) {
        let mut outcome = EntryOutcome::default();

        let icon_url = match resolve_favicon_url(&entry.url, entry.favicon.as_deref()) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot resolve favicon for {}: {}", entry.url, e);
                record_failure(&mut entry, EntryStatus::Error, None, e.to_string());
                return (entry, outcome);
            }
        };
        entry.favicon_url = Some(icon_url.clone());

        let validators = match self.policy.decide(&entry, now) {
            CacheDecision::SkipExhausted => {
                trace!("{} exhausted {} retries, skipping", entry.domain, self.policy.retry_cap());
                entry.status = EntryStatus::SkippedMaxRetries;
                return (entry, outcome);
            }
            CacheDecision::SkipRecent => {
                trace!("{} checked recently, skipping", entry.domain);
                // A failing entry stays failing until its next real attempt
                if entry.status.is_tile_eligible() {
                    entry.status = EntryStatus::SkippedRecent;
                }
                return (entry, outcome);
            }
            CacheDecision::Fetch(validators) => validators,
        };

        outcome.network = true;
        entry.last_check_time = Some(now);

        match self.fetcher.fetch(&icon_url, &validators).await {
            Err(e) => {
                record_failure(&mut entry, EntryStatus::Error, None, describe_fetch_error(&e));
            }
            Ok(response) if response.is_not_modified() => {
                entry.status = EntryStatus::NotModified;
                entry.http_status = Some(response.status);
                entry.error = None;
                entry.failure_count = 0;
                if response.etag.is_some() {
                    entry.etag = response.etag;
                }
                if response.last_modified.is_some() {
                    entry.last_modified = response.last_modified;
                }
            }
            Ok(response) if response.is_ok() => {
                outcome.bytes_written = self.store_icon(&mut entry, &icon_url, response, now).await;
            }
            Ok(response) => {
                let status = response.status;
                record_failure(
                    &mut entry,
                    EntryStatus::Failed,
                    Some(status),
                    format!("HTTP {status}"),
                );
            }
        }

        (entry, outcome)
    }

    async fn store_icon(
        &self,
        entry: &mut CatalogueEntry,
        icon_url: &str,
        response: FetchResponse,
        now: DateTime<Utc>,
    ) -> u64 {
        let ico_hint = url_suggests_ico(icon_url)
            || response
                .content_type
                .as_deref()
                .map(|ct| ct.contains("icon"))
                .unwrap_or(false);

        let png = match normalize_icon(&response.body, ico_hint, self.icon_size) {
            Ok(png) => png,
            Err(e) => {
                warn!("Failed to decode favicon for {} from {}: {}", entry.domain, icon_url, e);
                record_failure(entry, EntryStatus::Failed, Some(response.status), e.to_string());
                return 0;
            }
        };

        if let Err(e) = self.storage.write_icon(&entry.domain, &png).await {
            warn!("Failed to store favicon for {}: {}", entry.domain, e);
            record_failure(
                entry,
                EntryStatus::Error,
                Some(response.status),
                format!("failed to write icon: {e}"),
            );
            return 0;
        }

        entry.status = EntryStatus::Downloaded;
        entry.http_status = Some(response.status);
        entry.error = None;
        entry.failure_count = 0;
        entry.etag = response.etag;
        entry.last_modified = response.last_modified;
        entry.download_time = Some(now);
        entry.content_length = response.content_length;
        entry.content_type = response.content_type;
        png.len() as u64
    }
}

/// Side effects of processing one entry, for run accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryOutcome {
    pub network: bool,
    pub bytes_written: u64,
}

fn record_failure(
    entry: &mut CatalogueEntry,
    status: EntryStatus,
    http_status: Option<u16>,
    message: String,
) {
    entry.status = status;
    entry.http_status = http_status;
    entry.error = Some(message);
    entry.failure_count = entry.failure_count.saturating_add(1);
}

fn describe_fetch_error(error: &FetchError) -> String {
    match error {
        FetchError::Timeout { .. } => "timeout".to_string(),
        other => other.to_string(),
    }
}

/// Input positions in ascending rank order, unranked last, capped
fn processing_order(inputs: &[CatalogueEntry], max_entries: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..inputs.len()).collect();
    order.sort_by_key(|&i| (inputs[i].rank.is_none(), inputs[i].rank));
    order.truncate(max_entries);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_order_sorts_by_rank_and_caps() {
        let inputs = vec![
            CatalogueEntry::new("https://c.example", Some(30)),
            CatalogueEntry::new("https://none.example", None),
            CatalogueEntry::new("https://a.example", Some(10)),
            CatalogueEntry::new("https://b.example", Some(20)),
        ];
        assert_eq!(processing_order(&inputs, 10), vec![2, 3, 0, 1]);
        assert_eq!(processing_order(&inputs, 2), vec![2, 3]);
    }

    #[test]
    fn test_record_failure_increments_count() {
        let mut entry = CatalogueEntry::new("https://a.example", Some(1));
        entry.failure_count = 2;
        record_failure(&mut entry, EntryStatus::Failed, Some(500), "HTTP 500".to_string());
        assert_eq!(entry.failure_count, 3);
        assert_eq!(entry.http_status, Some(500));
        assert_eq!(entry.error.as_deref(), Some("HTTP 500"));
    }
}
