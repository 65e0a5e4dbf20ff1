//! Tile Compositor: ranked sprite sheets, their sidecars and the preview

pub mod compositor;
pub mod layout;
pub mod manifest;
pub mod mtime_index;
pub mod render;
pub mod sidecar;
pub mod staleness;

pub use compositor::{TileCompositor, TileSummary};
pub use layout::CellLayout;
pub use manifest::{TileManifest, TileReference};
pub use mtime_index::{FsModificationIndex, ModificationIndex};
pub use staleness::{ArtifactState, StaleReason, Staleness, StalenessDetector};
