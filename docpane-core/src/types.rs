use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 1-based page, slide or sheet number.
pub type UnitNumber = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl DocumentKind {
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn unit_noun(self) -> &'static str {
        match self {
            Self::Pdf | Self::Docx => "page",
            Self::Pptx => "slide",
            Self::Xlsx => "sheet",
        }
    }

    /// Whether the backend rasterizes units of this kind (as opposed to HTML).
    pub fn is_raster(self) -> bool {
        matches!(self, Self::Pdf)
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "pptx" => Ok(Self::Pptx),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(format!("unknown document kind `{other}`")),
        }
    }
}

/// Identifies a document on the conversion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub path: String,
    pub kind: DocumentKind,
}

impl FileRef {
    pub fn new(path: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Builds a reference with the kind inferred from the file extension.
    pub fn from_path(path: impl Into<String>) -> Option<Self> {
        let path = path.into();
        let kind = DocumentKind::from_path(&path)?;
        Some(Self { path, kind })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub total_units: u32,
    pub file_size_bytes: u64,
    /// Sheet names for spreadsheets, empty for everything else.
    pub unit_labels: Vec<String>,
}

impl DocumentInfo {
    pub fn contains(&self, unit: UnitNumber) -> bool {
        unit >= 1 && unit <= self.total_units
    }

    pub fn label(&self, unit: UnitNumber) -> Option<&str> {
        let index = usize::try_from(unit).ok()?.checked_sub(1)?;
        self.unit_labels.get(index).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BoundingBox,
}

/// RGBA pixels rendered locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    /// Encoded raster bytes (PNG or JPEG) as returned by the backend.
    Encoded {
        image_data: Bytes,
        width: u32,
        height: u32,
    },
    Bitmap(Bitmap),
    Markup {
        html: String,
    },
}

impl PageContent {
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Self::Encoded { width, height, .. } => Some((*width, *height)),
            Self::Bitmap(bitmap) => Some((bitmap.width, bitmap.height)),
            Self::Markup { .. } => None,
        }
    }
}

/// Render payload for one unit. Never mutated once cached.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub unit: UnitNumber,
    pub content: PageContent,
    pub text_layer: Option<Vec<TextSpan>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown quality `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParameters {
    zoom: f32,
    pub quality: Quality,
}

impl RenderParameters {
    pub const MIN_ZOOM: f32 = 0.5;
    pub const MAX_ZOOM: f32 = 3.0;
    pub const DEFAULT_ZOOM: f32 = 1.0;
    pub const ZOOM_STEP: f32 = 0.25;

    pub fn new(zoom: f32, quality: Quality) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
            quality,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn with_zoom(self, zoom: f32) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
            ..self
        }
    }

    pub fn with_quality(self, quality: Quality) -> Self {
        Self { quality, ..self }
    }
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ZOOM, Quality::default())
    }
}

fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_nan() {
        return RenderParameters::DEFAULT_ZOOM;
    }
    zoom.clamp(RenderParameters::MIN_ZOOM, RenderParameters::MAX_ZOOM)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Image,
    TextOverlay,
    ExternalEngine,
}

impl ViewMode {
    pub fn next(self) -> Self {
        match self {
            Self::Image => Self::TextOverlay,
            Self::TextOverlay => Self::ExternalEngine,
            Self::ExternalEngine => Self::Image,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::TextOverlay => "text",
            Self::ExternalEngine => "engine",
        }
    }

    pub fn wants_text_layer(self) -> bool {
        matches!(self, Self::TextOverlay)
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "text" | "text_overlay" | "overlay" => Ok(Self::TextOverlay),
            "engine" | "external_engine" | "pdfium" => Ok(Self::ExternalEngine),
            other => Err(format!("unknown view mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub unit: UnitNumber,
    pub match_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResults {
    pub query: String,
    pub total_matches: u32,
    pub pages_with_matches: u32,
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Index of the first hit strictly after `unit`, wrapping around.
    pub fn next_after(&self, unit: UnitNumber) -> Option<usize> {
        self.hits
            .iter()
            .position(|hit| hit.unit > unit)
            .or(if self.hits.is_empty() { None } else { Some(0) })
    }

    /// Index of the last hit strictly before `unit`, wrapping around.
    pub fn prev_before(&self, unit: UnitNumber) -> Option<usize> {
        self.hits
            .iter()
            .rposition(|hit| hit.unit < unit)
            .or_else(|| self.hits.len().checked_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorScope {
    Metadata,
    Page(UnitNumber),
    Search,
    Engine,
}

/// A failure as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub scope: ErrorScope,
    pub message: String,
}

impl ViewError {
    pub fn new(scope: ErrorScope, message: impl Into<String>) -> Self {
        Self {
            scope,
            message: message.into(),
        }
    }

    /// Metadata failures replace the whole view and need an explicit retry.
    pub fn is_dismissible(&self) -> bool {
        !matches!(self.scope, ErrorScope::Metadata)
    }
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ViewError {}

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub current_unit: UnitNumber,
    pub loading: bool,
    pub searching: bool,
    pub last_error: Option<ViewError>,
    pub page_errors: HashMap<UnitNumber, String>,
    pub search_results: Option<SearchResults>,
    pub selected_text: Option<String>,
    pub visible: BTreeSet<UnitNumber>,
}

impl ViewState {
    pub fn fresh() -> Self {
        Self {
            current_unit: 1,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_is_clamped_to_supported_range() {
        let params = RenderParameters::default();
        assert_eq!(params.with_zoom(5.0).zoom(), 3.0);
        assert_eq!(params.with_zoom(0.1).zoom(), 0.5);
        assert_eq!(params.with_zoom(1.75).zoom(), 1.75);
        assert_eq!(params.with_zoom(f32::NAN).zoom(), 1.0);
    }

    #[test]
    fn kind_is_inferred_from_extension() {
        assert_eq!(DocumentKind::from_path("docs/a.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path("deck.pptx"), Some(DocumentKind::Pptx));
        assert_eq!(DocumentKind::from_path("notes.txt"), None);
        assert_eq!(DocumentKind::from_path("no_extension"), None);
    }

    #[test]
    fn search_navigation_wraps() {
        let results = SearchResults {
            query: "invoice".into(),
            total_matches: 3,
            pages_with_matches: 2,
            hits: vec![
                SearchHit {
                    unit: 2,
                    match_count: 1,
                },
                SearchHit {
                    unit: 7,
                    match_count: 2,
                },
            ],
        };
        assert_eq!(results.next_after(1), Some(0));
        assert_eq!(results.next_after(2), Some(1));
        assert_eq!(results.next_after(7), Some(0));
        assert_eq!(results.prev_before(7), Some(0));
        assert_eq!(results.prev_before(2), Some(1));
        assert_eq!(SearchResults::default().next_after(1), None);
    }

    #[test]
    fn labels_are_one_based() {
        let info = DocumentInfo {
            title: None,
            total_units: 2,
            file_size_bytes: 0,
            unit_labels: vec!["Summary".into(), "Q1".into()],
        };
        assert_eq!(info.label(1), Some("Summary"));
        assert_eq!(info.label(2), Some("Q1"));
        assert_eq!(info.label(0), None);
        assert!(!info.contains(3));
    }
}
