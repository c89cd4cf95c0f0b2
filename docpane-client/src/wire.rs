//! JSON payloads of the conversion service. Every response wraps its payload
//! in `{ "detail": ... }`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use docpane_core::{
    BoundingBox, DocumentInfo, DocumentKind, PageContent, PageRecord, SearchHit, SearchResults,
    ServiceError, TextSpan, UnitNumber,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub detail: T,
}

/// Error bodies carry either a message or arbitrary JSON in `detail`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub detail: serde_json::Value,
}

impl ErrorEnvelope {
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) if text.trim().is_empty() => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InfoPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub slide_count: Option<u32>,
    #[serde(default, alias = "sheets")]
    pub sheet_names: Option<Vec<String>>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl InfoPayload {
    pub fn into_info(self, kind: DocumentKind) -> Result<DocumentInfo, ServiceError> {
        let (total_units, unit_labels) = match kind {
            DocumentKind::Pdf | DocumentKind::Docx => (self.page_count, Vec::new()),
            DocumentKind::Pptx => (self.slide_count, Vec::new()),
            DocumentKind::Xlsx => {
                let names = self.sheet_names.unwrap_or_default();
                (Some(names.len() as u32), names)
            }
        };
        let total_units = total_units.ok_or_else(|| {
            ServiceError::Malformed(format!("{kind:?} info is missing its {} count", kind.unit_noun()))
        })?;
        Ok(DocumentInfo {
            title: self.title.filter(|title| !title.trim().is_empty()),
            total_units,
            file_size_bytes: self.file_size.unwrap_or(0),
            unit_labels,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextBlock {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: String,
    pub bbox: BoundingBox,
}

impl TextBlock {
    fn is_word(&self) -> bool {
        self.kind.as_deref().map_or(true, |kind| kind == "word") && !self.text.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PagePayload {
    #[serde(default)]
    pub page_number: Option<UnitNumber>,
    pub image_data: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub text_layer: Option<Vec<TextBlock>>,
}

impl PagePayload {
    /// `fallback_unit` is used when the payload does not echo its page number.
    pub fn into_record(self, fallback_unit: UnitNumber, with_text: bool) -> Result<PageRecord, ServiceError> {
        let unit = self.page_number.unwrap_or(fallback_unit);
        let image_data = decode_image(&self.image_data)
            .map_err(|err| ServiceError::Malformed(format!("page {unit} image: {err}")))?;
        let text_layer = if with_text {
            Some(
                self.text_layer
                    .unwrap_or_default()
                    .into_iter()
                    .filter(TextBlock::is_word)
                    .map(|block| TextSpan {
                        text: block.text,
                        bbox: block.bbox,
                    })
                    .collect(),
            )
        } else {
            None
        };
        Ok(PageRecord {
            unit,
            content: PageContent::Encoded {
                image_data,
                width: self.width,
                height: self.height,
            },
            text_layer,
        })
    }
}

/// Accepts plain base64 as well as a `data:` URL.
fn decode_image(data: &str) -> Result<Bytes, base64::DecodeError> {
    let data = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    STANDARD.decode(data.trim()).map(Bytes::from)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RangePayload {
    #[serde(default)]
    pub pages: Vec<PagePayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarkupPayload {
    #[serde(default)]
    pub html: Option<String>,
}

impl MarkupPayload {
    pub fn into_record(self, unit: UnitNumber) -> PageRecord {
        PageRecord {
            unit,
            content: PageContent::Markup {
                html: self.html.unwrap_or_default(),
            },
            text_layer: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchMatchPayload {
    pub page_number: UnitNumber,
    #[serde(default)]
    pub matches: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchPayload {
    #[serde(default)]
    pub total_matches: u32,
    #[serde(default)]
    pub pages_with_matches: u32,
    #[serde(default)]
    pub results: Vec<SearchMatchPayload>,
}

impl SearchPayload {
    pub fn into_results(self, query: &str) -> SearchResults {
        let hits: Vec<SearchHit> = self
            .results
            .into_iter()
            .map(|result| SearchHit {
                unit: result.page_number,
                match_count: result.matches.len() as u32,
            })
            .collect();
        SearchResults {
            query: query.to_string(),
            total_matches: self.total_matches,
            pages_with_matches: self.pages_with_matches.max(hits.len() as u32),
            hits,
        }
    }
}
