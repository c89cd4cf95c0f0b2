use std::path::PathBuf;

use thiserror::Error;

use crate::types::DocumentKind;

/// Failure talking to the conversion service or a local engine.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{operation} is not supported for {kind:?} documents")]
    Unsupported {
        operation: &'static str,
        kind: DocumentKind,
    },
    #[error("rendering engine failed: {0}")]
    Engine(String),
}

impl ServiceError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
