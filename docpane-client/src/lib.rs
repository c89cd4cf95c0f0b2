//! Clients for the document-conversion service and, behind the `pdfium`
//! feature, a local PDF rasterizer.

mod http;
#[cfg(feature = "pdfium")]
mod pdfium;
mod wire;

pub use http::HttpDocumentService;
#[cfg(feature = "pdfium")]
pub use pdfium::{PdfiumEngine, ENV_PDFIUM_LIBRARY_PATH};
