use std::path::PathBuf;
use thiserror::Error;

/// Longest soundtrack id that is echoed back in the not-found message.
const MAX_DISPLAYED_ID_LEN: usize = 80;

#[derive(Debug, Error)]
pub enum HyliaError {
    /// The site answered, but reports no album under this id.
    #[error("{}", nonexistent_message(.id))]
    NonexistentSoundtrack { id: String },

    #[error("could not connect to {url}: {source}")]
    Connectivity {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// An element or pattern the scraper relies on is missing from a page.
    #[error("unexpected page structure at {url}: {detail}")]
    Structure { url: String, detail: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl HyliaError {
    pub fn structure(url: impl ToString, detail: impl Into<String>) -> Self {
        Self::Structure {
            url: url.to_string(),
            detail: detail.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure happened at the network level and is worth retrying.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }
}

fn nonexistent_message(id: &str) -> String {
    if id.is_empty() || id.chars().count() > MAX_DISPLAYED_ID_LEN {
        "The soundtrack does not exist.".to_string()
    } else {
        format!("The soundtrack \"{id}\" does not exist.")
    }
}

pub type Result<T, E = HyliaError> = std::result::Result<T, E>;
