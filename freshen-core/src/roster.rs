//! Client roster sources.
//!
//! A roster is a JSON document listing client identifiers, either wrapped
//! (`{"client_ids": ["a", "b"]}`) or as a bare list (`["a", "b"]`).
//! It lives in a local file or behind an HTTP(S) object URL.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::RosterError;
use crate::types::ClientId;

/// Default timeout for HTTP roster fetches.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of the client identifiers to reconcile.
pub trait RosterSource {
    fn load(&self) -> Result<Vec<ClientId>, RosterError>;

    /// Human-readable location for logs and error messages.
    fn location(&self) -> String;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RosterDocument {
    Wrapped { client_ids: Vec<String> },
    Bare(Vec<String>),
}

/// Decode a roster document.
///
/// Blank entries are dropped and repeated identifiers keep their first position.
pub fn parse_roster(text: &str, location: &str) -> Result<Vec<ClientId>, RosterError> {
    let doc = serde_json::from_str::<RosterDocument>(text).map_err(|source| {
        RosterError::Malformed {
            location: location.to_string(),
            source,
        }
    })?;
    let raw = match doc {
        RosterDocument::Wrapped { client_ids } => client_ids,
        RosterDocument::Bare(ids) => ids,
    };

    let mut seen = HashSet::new();
    let mut clients = Vec::with_capacity(raw.len());
    for id in raw {
        let id = id.trim();
        if id.is_empty() {
            continue;
        }
        if !seen.insert(id.to_string()) {
            tracing::debug!("duplicate client id '{id}' in roster {location}");
            continue;
        }
        clients.push(ClientId::from(id));
    }
    Ok(clients)
}

/// Roster stored in a local JSON file.
#[derive(Debug, Clone)]
pub struct FileRoster {
    pub path: PathBuf,
}

impl FileRoster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RosterSource for FileRoster {
    fn load(&self) -> Result<Vec<ClientId>, RosterError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| RosterError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_roster(&text, &self.location())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Roster fetched with a GET from an object URL (e.g. a presigned bucket link).
#[derive(Debug, Clone)]
pub struct HttpRoster {
    pub url: String,
    pub timeout: Duration,
}

impl HttpRoster {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: HTTP_TIMEOUT,
        }
    }
}

impl RosterSource for HttpRoster {
    fn load(&self) -> Result<Vec<ClientId>, RosterError> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let response = agent.get(&self.url).call().map_err(|e| RosterError::Http {
            url: self.url.clone(),
            source: Box::new(e),
        })?;
        let text = response.into_string().map_err(|source| RosterError::Body {
            url: self.url.clone(),
            source,
        })?;
        parse_roster(&text, &self.url)
    }

    fn location(&self) -> String {
        self.url.clone()
    }
}

/// Pick a roster source for `location`: `http://` / `https://` URLs are
/// fetched over HTTP, anything else is read as a local path.
pub fn source_for(location: &str) -> Box<dyn RosterSource> {
    let lower = location.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Box::new(HttpRoster::new(location))
    } else {
        Box::new(FileRoster::new(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_document() {
        let clients = parse_roster(r#"{"client_ids": ["a", "b"]}"#, "test").unwrap();
        assert_eq!(clients, vec![ClientId::from("a"), ClientId::from("b")]);
    }

    #[test]
    fn parses_bare_list() {
        let clients = parse_roster(r#"["a", "b"]"#, "test").unwrap();
        assert_eq!(clients, vec![ClientId::from("a"), ClientId::from("b")]);
    }

    #[test]
    fn drops_blank_and_duplicate_ids() {
        let clients = parse_roster(r#"[" a ", "", "b", "a"]"#, "test").unwrap();
        assert_eq!(clients, vec![ClientId::from("a"), ClientId::from("b")]);
    }

    #[test]
    fn rejects_unknown_shape() {
        let err = parse_roster(r#"{"clients": ["a"]}"#, "bucket/key.json").unwrap_err();
        assert!(matches!(err, RosterError::Malformed { .. }), "got: {err}");
        assert!(err.to_string().contains("bucket/key.json"));
    }

    #[test]
    fn source_for_picks_http_for_urls() {
        assert_eq!(
            source_for("https://bucket.example/roster.json").location(),
            "https://bucket.example/roster.json"
        );
        assert_eq!(source_for("/tmp/roster.json").location(), "/tmp/roster.json");
    }
}
