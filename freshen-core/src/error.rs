//! Error types for freshen-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with the path that was being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write/save path).
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse error on load, with the store file path.
    #[error("failed to parse record store at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.freshen/`.
    #[error("cannot determine home directory; set $HOME or pass --store")]
    HomeNotFound,

    /// A backend reported a failure that has no local I/O counterpart.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors raised while fetching or decoding the client roster.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("cannot read roster at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("roster request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("cannot read roster body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The document is neither `{"client_ids": [...]}` nor a bare list of strings.
    #[error("malformed roster at {location}: {source}")]
    Malformed {
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while loading a payload template.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("cannot read payload at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse payload at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The payload tries to set one of the record key attributes.
    #[error("payload field '{0}' is reserved for record attributes")]
    ReservedField(String),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
