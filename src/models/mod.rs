use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::domain::domain_from_url;

/// Acquisition state of a catalogue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Never processed by acquisition
    #[default]
    Pending,
    Downloaded,
    NotModified,
    SkippedRecent,
    /// Retry cap reached; no network attempt is made any more
    SkippedMaxRetries,
    /// The server answered with a status other than 200/304, or the body
    /// could not be decoded
    Failed,
    /// Timeout, transport failure or an unresolvable favicon URL
    Error,
}

impl EntryStatus {
    pub const ALL: [EntryStatus; 7] = [
        EntryStatus::Pending,
        EntryStatus::Downloaded,
        EntryStatus::NotModified,
        EntryStatus::SkippedRecent,
        EntryStatus::SkippedMaxRetries,
        EntryStatus::Failed,
        EntryStatus::Error,
    ];

    /// Statuses whose local icon may be composited into a tile
    pub fn is_tile_eligible(self) -> bool {
        matches!(
            self,
            EntryStatus::Downloaded | EntryStatus::NotModified | EntryStatus::SkippedRecent
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Downloaded => "downloaded",
            EntryStatus::NotModified => "not_modified",
            EntryStatus::SkippedRecent => "skipped_recent",
            EntryStatus::SkippedMaxRetries => "skipped_max_retries",
            EntryStatus::Failed => "failed",
            EntryStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placement of an entry inside a rendered tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileAssignment {
    /// Tile image file name, relative to the tiles directory
    pub file: String,
    /// Zero-based position inside the tile
    pub index: usize,
    pub row: u32,
    pub col: u32,
}

/// Cache validators replayed on the next conditional request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// One record of the catalogue, keyed by `domain`
///
/// `url`, `domain`, `rank` and `favicon` are owned by the upstream rank
/// join. Every other field is written by acquisition, except `tile` which
/// only the tile compositor writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueEntry {
    pub url: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u64>,
    /// Raw favicon reference from the upstream record, possibly relative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_check_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Consecutive failures; a missing value means zero
    #[serde(default)]
    pub failure_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile: Option<TileAssignment>,
}

impl CatalogueEntry {
    pub fn new(url: impl Into<String>, rank: Option<u64>) -> Self {
        let url = url.into();
        let domain = domain_from_url(&url).unwrap_or_default();
        Self {
            url,
            domain,
            rank,
            favicon: None,
            favicon_url: None,
            status: EntryStatus::Pending,
            http_status: None,
            error: None,
            etag: None,
            last_modified: None,
            last_check_time: None,
            download_time: None,
            content_length: None,
            content_type: None,
            failure_count: 0,
            tile: None,
        }
    }

    pub fn with_favicon(mut self, favicon: impl Into<String>) -> Self {
        self.favicon = Some(favicon.into());
        self
    }

    /// Recompute `domain` from `url`; returns false when the URL has no host
    pub fn refresh_domain(&mut self) -> bool {
        match domain_from_url(&self.url) {
            Some(domain) => {
                self.domain = domain;
                true
            }
            None => false,
        }
    }

    pub fn validators(&self) -> Validators {
        Validators {
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
        }
    }

    /// Build the persisted view of one catalogue record
    ///
    /// Precedence for acquisition and tile fields is
    /// `fresh` (this run) > `prior` (persisted state) > nothing (bare input).
    /// Upstream-owned fields (`url`, `domain`, `rank`, `favicon`) always come
    /// from `bare`, so a re-ranked catalogue is reflected immediately.
    pub fn merge_layers(
        bare: &CatalogueEntry,
        prior: Option<&CatalogueEntry>,
        fresh: Option<&CatalogueEntry>,
    ) -> CatalogueEntry {
        let mut merged = bare.clone();
        if let Some(state) = fresh.or(prior) {
            merged.copy_tracked_fields(state);
        }
        merged
    }

    fn copy_tracked_fields(&mut self, from: &CatalogueEntry) {
        self.favicon_url = from.favicon_url.clone();
        self.status = from.status;
        self.http_status = from.http_status;
        self.error = from.error.clone();
        self.etag = from.etag.clone();
        self.last_modified = from.last_modified.clone();
        self.last_check_time = from.last_check_time;
        self.download_time = from.download_time;
        self.content_length = from.content_length;
        self.content_type = from.content_type.clone();
        self.failure_count = from.failure_count;
        self.tile = from.tile.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(url: &str, status: EntryStatus, failures: u32) -> CatalogueEntry {
        let mut entry = CatalogueEntry::new(url, Some(1));
        entry.status = status;
        entry.failure_count = failures;
        entry.etag = Some(format!("\"{}\"", status));
        entry
    }

    #[test]
    fn test_missing_failure_count_deserializes_as_zero() {
        let entry: CatalogueEntry =
            serde_json::from_str(r#"{"url":"https://example.com","rank":7}"#).unwrap();
        assert_eq!(entry.failure_count, 0);
        assert_eq!(entry.status, EntryStatus::Pending);
        assert!(entry.tile.is_none());
    }

    #[test]
    fn test_serializes_camel_case_and_snake_case_status() {
        let mut entry = CatalogueEntry::new("https://www.example.com", Some(3));
        entry.status = EntryStatus::SkippedMaxRetries;
        entry.failure_count = 3;
        entry.http_status = Some(500);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["status"], "skipped_max_retries");
        assert_eq!(json["failureCount"], 3);
        assert_eq!(json["httpStatus"], 500);
        assert_eq!(json["domain"], "example.com");
        assert!(json.get("etag").is_none());
    }

    #[test]
    fn test_merge_prefers_fresh_over_prior() {
        let bare = CatalogueEntry::new("https://example.com", Some(1));
        let prior = tracked("https://example.com", EntryStatus::Failed, 2);
        let fresh = tracked("https://example.com", EntryStatus::Downloaded, 0);

        let merged = CatalogueEntry::merge_layers(&bare, Some(&prior), Some(&fresh));
        assert_eq!(merged.status, EntryStatus::Downloaded);
        assert_eq!(merged.failure_count, 0);
    }

    #[test]
    fn test_merge_falls_back_to_prior_then_bare() {
        let bare = CatalogueEntry::new("https://example.com", Some(1));
        let prior = tracked("https://example.com", EntryStatus::Failed, 2);

        let merged = CatalogueEntry::merge_layers(&bare, Some(&prior), None);
        assert_eq!(merged.status, EntryStatus::Failed);
        assert_eq!(merged.failure_count, 2);

        let merged = CatalogueEntry::merge_layers(&bare, None, None);
        assert_eq!(merged, bare);
    }

    #[test]
    fn test_merge_takes_rank_from_bare_input() {
        let bare = CatalogueEntry::new("https://example.com", Some(42));
        let mut prior = tracked("https://example.com", EntryStatus::Downloaded, 0);
        prior.rank = Some(7);
        prior.tile = Some(TileAssignment {
            file: "1.webp".to_string(),
            index: 6,
            row: 0,
            col: 6,
        });

        let merged = CatalogueEntry::merge_layers(&bare, Some(&prior), None);
        assert_eq!(merged.rank, Some(42));
        assert_eq!(merged.tile, prior.tile);
    }

    #[test]
    fn test_tile_eligibility() {
        let eligible: Vec<_> = EntryStatus::ALL
            .iter()
            .filter(|s| s.is_tile_eligible())
            .collect();
        assert_eq!(
            eligible,
            vec![
                &EntryStatus::Downloaded,
                &EntryStatus::NotModified,
                &EntryStatus::SkippedRecent
            ]
        );
    }
}
