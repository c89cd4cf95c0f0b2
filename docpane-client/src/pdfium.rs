use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use docpane_core::{Bitmap, ExternalEngine, ServiceError, UnitNumber};
use pdfium_render::prelude::*;
use tracing::{debug, instrument, warn};

/// Points at a Pdfium shared library to bind before the usual locations.
pub const ENV_PDFIUM_LIBRARY_PATH: &str = "DOCPANE_PDFIUM_LIBRARY_PATH";

/// Rasterizes PDF pages locally with Pdfium.
pub struct PdfiumEngine {
    pdfium: Arc<Pdfium>,
}

impl PdfiumEngine {
    /// Binds Pdfium from `DOCPANE_PDFIUM_LIBRARY_PATH`, the working directory
    /// or the system library path, in that order.
    pub fn new() -> Result<Self> {
        let pdfium = match bind_pdfium_from_env() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

#[async_trait]
impl ExternalEngine for PdfiumEngine {
    fn name(&self) -> &str {
        "pdfium"
    }

    #[instrument(skip(self, document), fields(bytes = document.len()))]
    async fn render(&self, document: Bytes, unit: UnitNumber, scale: f32) -> Result<Bitmap, ServiceError> {
        let pdfium = Arc::clone(&self.pdfium);
        tokio::task::spawn_blocking(move || render_page(&pdfium, &document, unit, scale))
            .await
            .map_err(|err| ServiceError::Engine(format!("render task failed: {err}")))?
            .map_err(|err| ServiceError::Engine(err.to_string()))
    }
}

fn render_page(pdfium: &Pdfium, document: &[u8], unit: UnitNumber, scale: f32) -> Result<Bitmap> {
    let index = unit
        .checked_sub(1)
        .and_then(|index| PdfPageIndex::try_from(index).ok())
        .ok_or_else(|| anyhow!("page {unit} is out of supported range"))?;
    let document = pdfium
        .load_pdf_from_byte_slice(document, None)
        .map_err(|err| anyhow!("failed to open document: {err}"))?;
    let page = document
        .pages()
        .get(index)
        .map_err(|err| anyhow!("page {unit} out of range: {err}"))?;

    let config = PdfRenderConfig::new().scale_page_by_factor(scale.max(0.1));
    let bitmap = page
        .render_with_config(&config)
        .map_err(|err| anyhow!("failed to render page {unit}: {err}"))?;
    let image = bitmap.as_image().to_rgba8();
    let (width, height) = image.dimensions();
    debug!(unit, width, height, "rendered page");
    Ok(Bitmap {
        width,
        height,
        rgba: image.into_raw(),
    })
}

fn bind_pdfium_from_env() -> Option<Pdfium> {
    match std::env::var(ENV_PDFIUM_LIBRARY_PATH) {
        Ok(path) if !path.is_empty() => match Pdfium::bind_to_library(&path) {
            Ok(bindings) => Some(Pdfium::new(bindings)),
            Err(err) => {
                warn!("failed to load Pdfium from {}: {}", path, err);
                None
            }
        },
        _ => None,
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");

    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("{}: {}", cwd_path.display(), err));
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; set {} or install it ({})",
                ENV_PDFIUM_LIBRARY_PATH,
                errors.join(", ")
            ))
        }
    }
}
