//! Partition the ranked catalogue into tiles and keep them current
//!
//! Eligible entries (tile-eligible status, a rank, and an icon present in
//! the mtime index) are sorted by rank and cut into `grid_size²` chunks.
//! Chunk `i` (1-based) becomes `<i>.webp` plus `<i>.json`. Every artifact
//! goes through the staleness detector first, so an unchanged catalogue
//! costs one stat and one small read per tile.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::fs;
use tracing::{debug, info, warn};

use super::layout::{
    image_name, parse_tile_index, sidecar_name, tile_image_name, tile_sidecar_name, CellLayout,
    MANIFEST_FILE, PREVIEW_STEM, SYNTHETIC_STEM,
};
use super::manifest::{TileManifest, TileReference};
use super::mtime_index::{FsModificationIndex, ModificationIndex};
use super::render::{render, Placement};
use super::sidecar::write_sidecar;
use super::staleness::{ArtifactState, StalenessDetector};
use crate::acquisition::IconStorage;
use crate::catalogue::CatalogueStore;
use crate::config::{Config, TilesConfig};
use crate::errors::{AppError, AppResult};
use crate::models::TileAssignment;
use crate::utils::fs::write_atomic;

const PROGRESS_EVERY_TILES: usize = 10;

/// Counters for one compositor pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileSummary {
    pub eligible: usize,
    pub tiles: usize,
    pub tiles_rendered: usize,
    pub tiles_skipped: usize,
    pub sidecars_written: usize,
    pub omitted_icons: usize,
    pub preview_rendered: bool,
    pub synthetic_references: usize,
    pub manifest_written: bool,
}

#[derive(Debug, Clone)]
struct EligibleEntry {
    domain: String,
    icon: PathBuf,
}

/// One image/sidecar pair and how to draw it
struct Artifact {
    label: String,
    tile_index: Option<usize>,
    image: PathBuf,
    sidecar: PathBuf,
    layout: CellLayout,
    canvas: (u32, u32),
}

#[derive(Debug, Clone, Copy, Default)]
struct RefreshOutcome {
    rendered: bool,
    sidecar_written: bool,
    omitted: usize,
}

pub struct TileCompositor {
    config: TilesConfig,
    storage: IconStorage,
    tiles_dir: PathBuf,
}

impl TileCompositor {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.tiles.clone(),
            storage: IconStorage::new(&config.paths.icons_dir),
            tiles_dir: config.paths.tiles_dir.clone(),
        }
    }

    /// Load the state file, composite, and write the state back
    pub async fn run(&self, state_path: &Path) -> AppResult<TileSummary> {
        let mut store = CatalogueStore::load(state_path).await?;
        let index = FsModificationIndex::build(self.storage.root()).await?;
        info!(
            "Loaded {} catalogue entries from {}, {} icons indexed",
            store.len(),
            state_path.display(),
            index.len()
        );

        let summary = self.compose(&mut store, &index).await?;
        store.save(state_path).await?;
        Ok(summary)
    }

    /// Composite against an already loaded store and mtime index
    ///
    /// Tile assignments are written through `store`; persisting it is up to
    /// the caller.
    pub async fn compose<I>(&self, store: &mut CatalogueStore, index: &I) -> AppResult<TileSummary>
    where
        I: ModificationIndex + ?Sized,
    {
        let run_start = Instant::now();
        fs::create_dir_all(&self.tiles_dir).await?;

        let last_produced = highest_tile_on_disk(&self.tiles_dir).await?;
        let eligible = eligible_entries(store, index);
        let per_tile = self.config.entries_per_tile();
        let tile_layout = CellLayout::tile(&self.config);
        let total_tiles = eligible.len().div_ceil(per_tile);

        info!(
            "Compositing {} eligible entries into {} tiles of {} (last produced tile: {})",
            eligible.len(),
            total_tiles,
            per_tile,
            last_produced.map_or_else(|| "none".to_string(), |i| i.to_string())
        );

        let mut summary = TileSummary {
            eligible: eligible.len(),
            tiles: total_tiles,
            ..TileSummary::default()
        };
        let mut manifest = TileManifest::new(&self.config);
        let detector = StalenessDetector::new(index, self.config.force, last_produced);

        for (chunk_no, chunk) in eligible.chunks(per_tile).enumerate() {
            let tile_index = chunk_no + 1;
            let image = tile_image_name(tile_index);
            let sidecar = tile_sidecar_name(tile_index);
            let artifact = Artifact {
                label: format!("tile {tile_index}"),
                tile_index: Some(tile_index),
                image: self.tiles_dir.join(&image),
                sidecar: self.tiles_dir.join(&sidecar),
                layout: tile_layout,
                canvas: tile_layout.canvas_size(),
            };

            let outcome = self.refresh(&artifact, chunk, &detector).await?;
            if outcome.rendered {
                summary.tiles_rendered += 1;
            } else {
                summary.tiles_skipped += 1;
            }
            if outcome.sidecar_written {
                summary.sidecars_written += 1;
            }
            summary.omitted_icons += outcome.omitted;

            for (position, member) in chunk.iter().enumerate() {
                let (row, col) = tile_layout.cell_of(position);
                let assignment = TileAssignment {
                    file: image.clone(),
                    index: position,
                    row,
                    col,
                };
                store.update(&member.domain, |entry| entry.tile = Some(assignment));
            }

            manifest.tiles.push(TileReference {
                index: tile_index,
                image,
                sidecar,
                entries: chunk.len(),
            });

            if tile_index % PROGRESS_EVERY_TILES == 0 {
                info!(
                    "Tile progress: {}/{} rendered={} skipped={} elapsed={:?}",
                    tile_index,
                    total_tiles,
                    summary.tiles_rendered,
                    summary.tiles_skipped,
                    run_start.elapsed()
                );
            }
        }

        summary.preview_rendered = self.refresh_preview(&eligible, index).await?;
        summary.synthetic_references = self
            .add_synthetic_references(&eligible, &detector, &mut manifest)
            .await?;
        summary.manifest_written = manifest
            .write_if_changed(&self.tiles_dir.join(MANIFEST_FILE))
            .await?;

        info!(
            "Tiling completed: eligible={} tiles={} rendered={} skipped={} sidecars_written={} \
             preview_rendered={} synthetic={} duration={:?}",
            summary.eligible,
            summary.tiles,
            summary.tiles_rendered,
            summary.tiles_skipped,
            summary.sidecars_written,
            summary.preview_rendered,
            summary.synthetic_references,
            run_start.elapsed()
        );
        Ok(summary)
    }

    /// Top-ranked entries drawn onto the fixed-size preview canvas
    async fn refresh_preview<I>(&self, eligible: &[EligibleEntry], index: &I) -> AppResult<bool>
    where
        I: ModificationIndex + ?Sized,
    {
        if eligible.is_empty() {
            debug!("No eligible entries, skipping preview");
            return Ok(false);
        }

        let layout = CellLayout::preview(&self.config);
        let members = &eligible[..layout.capacity().min(eligible.len())];
        let detector = StalenessDetector::new(index, self.config.force_preview, None);
        let artifact = Artifact {
            label: "preview".to_string(),
            tile_index: None,
            image: self.tiles_dir.join(image_name(PREVIEW_STEM)),
            sidecar: self.tiles_dir.join(sidecar_name(PREVIEW_STEM)),
            layout,
            canvas: (self.config.preview_width, self.config.preview_height),
        };

        Ok(self.refresh(&artifact, members, &detector).await?.rendered)
    }

    /// One placeholder tile repeated as N manifest references
    async fn add_synthetic_references<I>(
        &self,
        eligible: &[EligibleEntry],
        detector: &StalenessDetector<'_, I>,
        manifest: &mut TileManifest,
    ) -> AppResult<usize>
    where
        I: ModificationIndex + ?Sized,
    {
        let count = self.config.synthetic_tiles;
        if count == 0 {
            return Ok(0);
        }
        let placeholder = match eligible.first() {
            Some(entry) => entry,
            None => {
                warn!("Synthetic tiles requested but no eligible entry to repeat");
                return Ok(0);
            }
        };

        let per_tile = self.config.entries_per_tile();
        let members = vec![placeholder.clone(); per_tile];
        let layout = CellLayout::tile(&self.config);
        let artifact = Artifact {
            label: "synthetic tile".to_string(),
            tile_index: None,
            image: self.tiles_dir.join(image_name(SYNTHETIC_STEM)),
            sidecar: self.tiles_dir.join(sidecar_name(SYNTHETIC_STEM)),
            layout,
            canvas: layout.canvas_size(),
        };
        self.refresh(&artifact, &members, detector).await?;

        let first = manifest.tiles.len() + 1;
        manifest
            .tiles
            .extend((first..first + count).map(|index| TileReference {
                index,
                image: image_name(SYNTHETIC_STEM),
                sidecar: sidecar_name(SYNTHETIC_STEM),
                entries: per_tile,
            }));
        info!(
            "Added {} synthetic tile references repeating {}",
            count, placeholder.domain
        );
        Ok(count)
    }

    async fn refresh<I>(
        &self,
        artifact: &Artifact,
        members: &[EligibleEntry],
        detector: &StalenessDetector<'_, I>,
    ) -> AppResult<RefreshOutcome>
    where
        I: ModificationIndex + ?Sized,
    {
        let domains: Vec<String> = members.iter().map(|m| m.domain.clone()).collect();
        let icons: Vec<PathBuf> = members.iter().map(|m| m.icon.clone()).collect();

        let state = ArtifactState::read(&artifact.image, &artifact.sidecar).await?;
        let staleness = detector.check(artifact.tile_index, &state, &domains, &icons);
        let mut outcome = RefreshOutcome::default();

        match &staleness.regenerate {
            Some(reason) => {
                debug!("Rendering {} ({} icons): {}", artifact.label, members.len(), reason);
                let placements: Vec<Placement> = members
                    .iter()
                    .enumerate()
                    .map(|(position, member)| {
                        let (row, col) = artifact.layout.cell_of(position);
                        Placement {
                            source: self.storage.root().join(&member.icon),
                            row,
                            col,
                        }
                    })
                    .collect();

                let layout = artifact.layout;
                let (width, height) = artifact.canvas;
                let rendered =
                    tokio::task::spawn_blocking(move || render(&layout, width, height, &placements))
                        .await
                        .map_err(|e| AppError::internal(format!("render task failed: {e}")))??;

                write_atomic(&artifact.image, rendered.bytes).await?;
                outcome.rendered = true;
                outcome.omitted = rendered.omitted;
            }
            None => debug!("{} is up to date", artifact.label),
        }

        if staleness.rewrite_sidecar {
            write_sidecar(&artifact.sidecar, &domains).await?;
            outcome.sidecar_written = true;
        }

        Ok(outcome)
    }
}

/// Rank-sorted entries that can be placed in a tile
fn eligible_entries<I>(store: &CatalogueStore, index: &I) -> Vec<EligibleEntry>
where
    I: ModificationIndex + ?Sized,
{
    let mut eligible: Vec<(u64, EligibleEntry)> = store
        .entries()
        .iter()
        .filter(|e| e.status.is_tile_eligible() && !e.domain.is_empty())
        .filter_map(|e| {
            let rank = e.rank?;
            let icon = IconStorage::relative_path(&e.domain);
            if !index.contains(&icon) {
                debug!("No local icon for {}, not tiled", e.domain);
                return None;
            }
            Some((
                rank,
                EligibleEntry {
                    domain: e.domain.clone(),
                    icon,
                },
            ))
        })
        .collect();

    eligible.sort_by(|(a_rank, a), (b_rank, b)| a_rank.cmp(b_rank).then_with(|| a.domain.cmp(&b.domain)));
    eligible.into_iter().map(|(_, entry)| entry).collect()
}

/// Highest `<n>.webp` present before this run touches anything
async fn highest_tile_on_disk(tiles_dir: &Path) -> AppResult<Option<usize>> {
    let mut highest = None;
    let mut reader = fs::read_dir(tiles_dir).await?;
    while let Some(item) = reader.next_entry().await? {
        if let Some(index) = item.file_name().to_str().and_then(parse_tile_index) {
            highest = highest.max(Some(index));
        }
    }
    Ok(highest)
}
