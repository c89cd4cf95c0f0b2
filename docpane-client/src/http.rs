use async_trait::async_trait;
use bytes::Bytes;
use docpane_core::{
    DocumentInfo, DocumentKind, DocumentService, FileRef, PageRecord, RenderParameters,
    SearchResults, ServiceError, UnitNumber, ViewerConfig,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::wire::{
    Envelope, ErrorEnvelope, InfoPayload, MarkupPayload, PagePayload, RangePayload, SearchPayload,
};

/// [`DocumentService`] backed by the conversion service's `/files/` endpoints.
///
/// Requests are sent once, without timeouts or retries.
#[derive(Debug, Clone)]
pub struct HttpDocumentService {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpDocumentService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(config.api_base_url.clone()).with_access_token(config.access_token.clone())
    }

    /// Sent as a bearer token with every request.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|token| !token.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/files/{name}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        name: &str,
        form: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        debug!(endpoint = name, "posting form");
        let request = self.authorize(self.client.post(self.endpoint(name)).form(form));
        let response = send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)
            .map_err(|err| ServiceError::Malformed(format!("{name}: {err}")))?;
        Ok(envelope.detail)
    }

    fn unsupported(operation: &'static str, file: &FileRef) -> ServiceError {
        ServiceError::Unsupported {
            operation,
            kind: file.kind,
        }
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ServiceError> {
    let response = request
        .send()
        .await
        .map_err(|err| ServiceError::Transport(err.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| envelope.message())
        .unwrap_or_else(|| {
            format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )
        });
    Err(ServiceError::Status {
        status: status.as_u16(),
        detail,
    })
}

fn render_form(file: &FileRef, params: RenderParameters) -> Vec<(&'static str, String)> {
    vec![
        ("path", file.path.clone()),
        ("quality", params.quality.as_str().to_string()),
        ("scale", params.zoom().to_string()),
    ]
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    #[instrument(skip(self), fields(path = %file.path))]
    async fn info(&self, file: &FileRef) -> Result<DocumentInfo, ServiceError> {
        let endpoint = match file.kind {
            DocumentKind::Pdf => "pdf_info",
            DocumentKind::Docx => "docx_info",
            DocumentKind::Pptx => "pptx_info",
            DocumentKind::Xlsx => "xlsx_info",
        };
        let payload: InfoPayload = self.post(endpoint, &[("path", file.path.clone())]).await?;
        payload.into_info(file.kind)
    }

    #[instrument(skip(self, info), fields(path = %file.path))]
    async fn unit(
        &self,
        file: &FileRef,
        info: &DocumentInfo,
        unit: UnitNumber,
        params: RenderParameters,
        with_text: bool,
    ) -> Result<PageRecord, ServiceError> {
        if with_text && file.kind != DocumentKind::Pdf {
            return Err(Self::unsupported("text layers", file));
        }
        let path = ("path", file.path.clone());
        match file.kind {
            DocumentKind::Pdf => {
                let mut form = render_form(file, params);
                form.push(("page", unit.to_string()));
                let endpoint = if with_text {
                    "pdf_page_with_text"
                } else {
                    "pdf_page"
                };
                let payload: PagePayload = self.post(endpoint, &form).await?;
                let mut record = payload.into_record(unit, with_text)?;
                record.unit = unit;
                Ok(record)
            }
            DocumentKind::Docx => {
                let payload: MarkupPayload = self
                    .post("docx_page", &[path, ("page", unit.to_string())])
                    .await?;
                Ok(payload.into_record(unit))
            }
            DocumentKind::Pptx => {
                let payload: MarkupPayload = self
                    .post("pptx_slide", &[path, ("slide", unit.to_string())])
                    .await?;
                Ok(payload.into_record(unit))
            }
            DocumentKind::Xlsx => {
                let sheet = info.label(unit).ok_or_else(|| {
                    ServiceError::Malformed(format!("no sheet name known for sheet {unit}"))
                })?;
                let payload: MarkupPayload = self
                    .post("xlsx_sheet", &[path, ("sheet_name", sheet.to_string())])
                    .await?;
                Ok(payload.into_record(unit))
            }
        }
    }

    #[instrument(skip(self), fields(path = %file.path))]
    async fn unit_range(
        &self,
        file: &FileRef,
        start: UnitNumber,
        end: UnitNumber,
        params: RenderParameters,
    ) -> Result<Vec<PageRecord>, ServiceError> {
        if file.kind != DocumentKind::Pdf {
            return Err(Self::unsupported("range retrieval", file));
        }
        let mut form = render_form(file, params);
        form.push(("start_page", start.to_string()));
        form.push(("end_page", end.to_string()));
        let payload: RangePayload = self.post("pdf_pages_range", &form).await?;
        let mut records = Vec::with_capacity(payload.pages.len());
        for (offset, page) in payload.pages.into_iter().enumerate() {
            records.push(page.into_record(start + offset as UnitNumber, false)?);
        }
        Ok(records)
    }

    #[instrument(skip(self), fields(path = %file.path))]
    async fn search(&self, file: &FileRef, query: &str) -> Result<SearchResults, ServiceError> {
        if file.kind != DocumentKind::Pdf {
            return Err(Self::unsupported("search", file));
        }
        let payload: SearchPayload = self
            .post(
                "pdf_search",
                &[("path", file.path.clone()), ("search_text", query.to_string())],
            )
            .await?;
        Ok(payload.into_results(query))
    }

    #[instrument(skip(self), fields(path = %file.path))]
    async fn raw(&self, file: &FileRef) -> Result<Bytes, ServiceError> {
        if file.kind != DocumentKind::Pdf {
            return Err(Self::unsupported("raw download", file));
        }
        let request = self.authorize(
            self.client
                .get(self.endpoint("pdf_raw"))
                .query(&[("path", file.path.as_str())]),
        );
        let response = send(request).await?;
        response
            .bytes()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))
    }
}
