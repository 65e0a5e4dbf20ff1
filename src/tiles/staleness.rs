//! Per-artifact regeneration decisions
//!
//! An artifact is an image plus its sidecar. The image is regenerated when
//! forced, when it is the last tile a previous run produced, when either
//! file is missing, when the chunk's domain sequence changed, or when any
//! source icon is newer than the image. The sidecar is rewritten whenever
//! it is missing or differs, independent of the image decision.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::mtime_index::ModificationIndex;
use super::sidecar::read_sidecar;
use crate::errors::AppResult;
use crate::utils::fs::modified_time;

/// What is currently on disk for one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactState {
    pub image_modified: Option<SystemTime>,
    pub sidecar: Option<Vec<String>>,
}

impl ArtifactState {
    pub async fn read(image: &Path, sidecar: &Path) -> AppResult<Self> {
        Ok(Self {
            image_modified: modified_time(image).await?,
            sidecar: read_sidecar(sidecar).await?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    Forced,
    /// Highest tile index on disk before this run; may be a partial write
    LastProduced,
    ImageMissing,
    SidecarMissing,
    MembershipChanged,
    SourceNewer(PathBuf),
}

impl std::fmt::Display for StaleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaleReason::Forced => f.write_str("forced"),
            StaleReason::LastProduced => f.write_str("last produced tile"),
            StaleReason::ImageMissing => f.write_str("image missing"),
            StaleReason::SidecarMissing => f.write_str("sidecar missing"),
            StaleReason::MembershipChanged => f.write_str("membership changed"),
            StaleReason::SourceNewer(path) => write!(f, "{} is newer", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staleness {
    /// `Some` when the image must be re-rendered
    pub regenerate: Option<StaleReason>,
    pub rewrite_sidecar: bool,
}

impl Staleness {
    pub fn is_fresh(&self) -> bool {
        self.regenerate.is_none() && !self.rewrite_sidecar
    }
}

pub struct StalenessDetector<'a, I: ModificationIndex + ?Sized> {
    index: &'a I,
    force: bool,
    last_produced: Option<usize>,
}

impl<'a, I: ModificationIndex + ?Sized> StalenessDetector<'a, I> {
    pub fn new(index: &'a I, force: bool, last_produced: Option<usize>) -> Self {
        Self {
            index,
            force,
            last_produced,
        }
    }

    /// Decide for one artifact
    ///
    /// `tile_index` is `None` for artifacts outside the numbered sequence
    /// (preview, synthetic placeholder), which are never "last produced".
    pub fn check(
        &self,
        tile_index: Option<usize>,
        state: &ArtifactState,
        domains: &[String],
        icons: &[PathBuf],
    ) -> Staleness {
        let sidecar_matches = state.sidecar.as_deref() == Some(domains);
        Staleness {
            regenerate: self.image_reason(tile_index, state, sidecar_matches, icons),
            rewrite_sidecar: !sidecar_matches,
        }
    }

    fn image_reason(
        &self,
        tile_index: Option<usize>,
        state: &ArtifactState,
        sidecar_matches: bool,
        icons: &[PathBuf],
    ) -> Option<StaleReason> {
        if self.force {
            return Some(StaleReason::Forced);
        }
        if tile_index.is_some() && tile_index == self.last_produced {
            return Some(StaleReason::LastProduced);
        }
        let image_modified = match state.image_modified {
            Some(modified) => modified,
            None => return Some(StaleReason::ImageMissing),
        };
        if state.sidecar.is_none() {
            return Some(StaleReason::SidecarMissing);
        }
        if !sidecar_matches {
            return Some(StaleReason::MembershipChanged);
        }
        icons
            .iter()
            .find(|icon| {
                self.index
                    .modified(icon)
                    .map(|modified| modified > image_modified)
                    .unwrap_or(false)
            })
            .map(|icon| StaleReason::SourceNewer(icon.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::mtime_index::FsModificationIndex;
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn domains() -> Vec<String> {
        vec!["a.example".to_string(), "b.example".to_string()]
    }

    fn icons() -> Vec<PathBuf> {
        vec![PathBuf::from("aa/bb/a.example.png"), PathBuf::from("cc/dd/b.example.png")]
    }

    fn index(icon_secs: u64) -> FsModificationIndex {
        icons().into_iter().map(|p| (p, at(icon_secs))).collect()
    }

    fn fresh_state() -> ArtifactState {
        ArtifactState {
            image_modified: Some(at(2_000)),
            sidecar: Some(domains()),
        }
    }

    #[test]
    fn test_up_to_date_artifact_is_skipped() {
        let index = index(1_000);
        let detector = StalenessDetector::new(&index, false, Some(5));
        let result = detector.check(Some(3), &fresh_state(), &domains(), &icons());
        assert!(result.is_fresh());
    }

    #[test]
    fn test_equal_mtime_is_not_newer() {
        let index = index(2_000);
        let detector = StalenessDetector::new(&index, false, None);
        let result = detector.check(Some(1), &fresh_state(), &domains(), &icons());
        assert_eq!(result.regenerate, None);
    }

    #[test]
    fn test_force_wins() {
        let index = index(1_000);
        let detector = StalenessDetector::new(&index, true, None);
        let result = detector.check(Some(1), &fresh_state(), &domains(), &icons());
        assert_eq!(result.regenerate, Some(StaleReason::Forced));
        assert!(!result.rewrite_sidecar);
    }

    #[test]
    fn test_last_produced_tile_is_always_regenerated() {
        let index = index(1_000);
        let detector = StalenessDetector::new(&index, false, Some(3));
        let result = detector.check(Some(3), &fresh_state(), &domains(), &icons());
        assert_eq!(result.regenerate, Some(StaleReason::LastProduced));

        let result = detector.check(None, &fresh_state(), &domains(), &icons());
        assert_eq!(result.regenerate, None);
    }

    #[test]
    fn test_newer_icon_triggers_regeneration() {
        let mut index: Vec<(PathBuf, SystemTime)> = icons().into_iter().map(|p| (p, at(1_000))).collect();
        index[1].1 = at(3_000);
        let index: FsModificationIndex = index.into_iter().collect();

        let detector = StalenessDetector::new(&index, false, None);
        let result = detector.check(Some(1), &fresh_state(), &domains(), &icons());
        assert_eq!(
            result.regenerate,
            Some(StaleReason::SourceNewer(PathBuf::from("cc/dd/b.example.png")))
        );
        assert!(!result.rewrite_sidecar);
    }

    #[test]
    fn test_reordered_sidecar_rewrites_both() {
        let index = index(1_000);
        let detector = StalenessDetector::new(&index, false, None);
        let mut state = fresh_state();
        state.sidecar = Some(vec!["b.example".to_string(), "a.example".to_string()]);

        let result = detector.check(Some(1), &state, &domains(), &icons());
        assert_eq!(result.regenerate, Some(StaleReason::MembershipChanged));
        assert!(result.rewrite_sidecar);
    }

    #[test]
    fn test_missing_files() {
        let index = index(1_000);
        let detector = StalenessDetector::new(&index, false, None);

        let no_image = ArtifactState {
            image_modified: None,
            sidecar: Some(domains()),
        };
        let result = detector.check(Some(1), &no_image, &domains(), &icons());
        assert_eq!(result.regenerate, Some(StaleReason::ImageMissing));
        assert!(!result.rewrite_sidecar);

        let no_sidecar = ArtifactState {
            image_modified: Some(at(2_000)),
            sidecar: None,
        };
        let result = detector.check(Some(1), &no_sidecar, &domains(), &icons());
        assert_eq!(result.regenerate, Some(StaleReason::SidecarMissing));
        assert!(result.rewrite_sidecar);
    }
}
