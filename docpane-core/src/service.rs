use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ServiceError;
use crate::types::{Bitmap, DocumentInfo, FileRef, PageRecord, RenderParameters, SearchResults, UnitNumber};

/// The remote document-conversion backend.
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn info(&self, file: &FileRef) -> Result<DocumentInfo, ServiceError>;

    /// Renders one unit. `with_text` asks for the text layer alongside the image.
    async fn unit(
        &self,
        file: &FileRef,
        info: &DocumentInfo,
        unit: UnitNumber,
        params: RenderParameters,
        with_text: bool,
    ) -> Result<PageRecord, ServiceError>;

    /// Renders `start..=end` in one request. Returns `Unsupported` when the
    /// backend has no batch endpoint for this kind of document.
    async fn unit_range(
        &self,
        file: &FileRef,
        start: UnitNumber,
        end: UnitNumber,
        params: RenderParameters,
    ) -> Result<Vec<PageRecord>, ServiceError>;

    async fn search(&self, file: &FileRef, query: &str) -> Result<SearchResults, ServiceError>;

    /// Original document bytes, for rendering by an [`ExternalEngine`].
    async fn raw(&self, file: &FileRef) -> Result<Bytes, ServiceError>;
}

/// A local renderer fed with the raw document bytes.
#[async_trait]
pub trait ExternalEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn render(
        &self,
        document: Bytes,
        unit: UnitNumber,
        scale: f32,
    ) -> Result<Bitmap, ServiceError>;
}
