//! Cache/retry policy: decides whether an entry gets a network request

use chrono::{DateTime, Duration, Utc};

use crate::config::AcquisitionConfig;
use crate::models::{CatalogueEntry, Validators};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// `failureCount` reached the retry cap
    SkipExhausted,
    /// Checked within the skip window
    SkipRecent,
    /// Issue a request, conditional when validators are present
    Fetch(Validators),
}

#[derive(Debug, Clone)]
pub struct CachePolicy {
    retry_cap: u32,
    skip_window: Duration,
}

impl CachePolicy {
    pub fn new(retry_cap: u32, skip_window: Duration) -> Self {
        Self {
            retry_cap,
            skip_window,
        }
    }

    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self::new(config.retry_cap, config.skip_window())
    }

    pub fn retry_cap(&self) -> u32 {
        self.retry_cap
    }

    /// Exhaustion is checked before recency, so a given-up entry is never
    /// reported as merely recently checked.
    pub fn decide(&self, entry: &CatalogueEntry, now: DateTime<Utc>) -> CacheDecision {
        if entry.failure_count >= self.retry_cap {
            return CacheDecision::SkipExhausted;
        }

        if let Some(last_check) = entry.last_check_time {
            if now.signed_duration_since(last_check) < self.skip_window {
                return CacheDecision::SkipRecent;
            }
        }

        CacheDecision::Fetch(entry.validators())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy() -> CachePolicy {
        CachePolicy::new(3, Duration::hours(24))
    }

    fn entry(failures: u32, checked_hours_ago: Option<i64>, now: DateTime<Utc>) -> CatalogueEntry {
        let mut entry = CatalogueEntry::new("https://example.com", Some(1));
        entry.failure_count = failures;
        entry.last_check_time = checked_hours_ago.map(|h| now - Duration::hours(h));
        entry
    }

    #[rstest]
    #[case(0, None, false)]
    #[case(0, Some(1), true)]
    #[case(2, Some(23), true)]
    #[case(2, Some(24), false)]
    #[case(0, Some(48), false)]
    fn test_recency_window(
        #[case] failures: u32,
        #[case] hours_ago: Option<i64>,
        #[case] expect_skip: bool,
    ) {
        let now = Utc::now();
        let decision = policy().decide(&entry(failures, hours_ago, now), now);
        assert_eq!(decision == CacheDecision::SkipRecent, expect_skip);
    }

    #[test]
    fn test_exhaustion_wins_over_recency() {
        let now = Utc::now();
        let decision = policy().decide(&entry(3, Some(1), now), now);
        assert_eq!(decision, CacheDecision::SkipExhausted);
    }

    #[test]
    fn test_fetch_carries_validators() {
        let now = Utc::now();
        let mut e = entry(1, Some(30), now);
        e.etag = Some("\"abc\"".to_string());
        e.last_modified = Some("Wed, 21 Oct 2015 07:28:00 GMT".to_string());

        match policy().decide(&e, now) {
            CacheDecision::Fetch(validators) => {
                assert_eq!(validators.etag.as_deref(), Some("\"abc\""));
                assert_eq!(
                    validators.last_modified.as_deref(),
                    Some("Wed, 21 Oct 2015 07:28:00 GMT")
                );
            }
            other => panic!("expected fetch, got {other:?}"),
        }
    }

    #[test]
    fn test_never_checked_entry_fetches_unconditionally() {
        let now = Utc::now();
        assert_eq!(
            policy().decide(&entry(0, None, now), now),
            CacheDecision::Fetch(Validators::default())
        );
    }
}
