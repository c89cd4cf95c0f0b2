//! View-state controller for documents rendered by a remote conversion
//! service: page cache, viewport-driven loading, render parameters, search
//! and text-overlay layout.

pub mod cache;
pub mod config;
pub mod error;
pub mod overlay;
pub mod service;
pub mod types;
pub mod viewer;
pub mod viewport;

pub use cache::{Generation, PageCache, StoreOutcome};
pub use config::ViewerConfig;
pub use error::{ConfigError, ServiceError};
pub use overlay::{OverlaySpan, TextOverlay};
pub use service::{DocumentService, ExternalEngine};
pub use types::*;
pub use viewer::{RenderedUnit, TextSelectedHook, Viewer, ViewerBuilder, ENGINE_SCALE_FACTOR};
pub use viewport::{FetchPlanner, NeighborPlanner, ViewportWatcher};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NextUnit { count: u32 },
    PrevUnit { count: u32 },
    GotoUnit { unit: UnitNumber },
    ZoomBy { delta: f32 },
    ResetZoom,
    SetQuality { quality: Quality },
    CycleQuality,
    SetViewMode { mode: ViewMode },
    CycleViewMode,
    Search { query: String },
    OpenSearchHit { index: usize },
    SearchNext { count: u32 },
    SearchPrev { count: u32 },
    SelectUnitText,
    /// Placeholders for these units became visible.
    Reveal { units: Vec<UnitNumber> },
    Retry,
    DismissError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerEvent {
    InfoLoaded,
    UnitLoaded(UnitNumber),
    UnitFailed(UnitNumber),
    CacheInvalidated,
    ScrollTo(UnitNumber),
    SearchFinished,
    ErrorRaised(ErrorScope),
}
