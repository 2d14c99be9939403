//! The documentation library.
//!
//! Documents are static files listed in a `docs.json` manifest next to them.
//! The manifest is read again on every request so new documents show up
//! without a restart.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod web;

pub const MANIFEST_FILE: &str = "docs.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Document {
    pub role: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub filename: String,
}

impl Document {
    /// Case-insensitive substring match on the title.
    pub fn matches(&self, query: &str) -> bool {
        self.title.to_lowercase().contains(&query.to_lowercase())
    }

    /// Link to the document file.
    pub fn href(&self) -> String {
        format!("/docs/{}", encode_path(&self.filename))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocsError {
    #[error("Failed to read the document manifest")]
    Io(#[from] std::io::Error),
    #[error("The document manifest is not valid")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct DocumentLibrary {
    dir: PathBuf,
}

impl DocumentLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the documents are served from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn load(&self) -> Result<Vec<Document>, DocsError> {
        let bytes = tokio::fs::read(self.dir.join(MANIFEST_FILE)).await?;
        let documents: Vec<Document> = serde_json::from_slice(&bytes)?;
        tracing::debug!(documents = documents.len(), "Loaded document manifest");
        Ok(documents)
    }
}

/// Documents matching `query`, grouped by role with roles in ascending
/// order. Manifest order is kept inside each group. An empty query matches
/// everything.
pub fn group_by_role(documents: &[Document], query: &str) -> BTreeMap<String, Vec<Document>> {
    let mut groups: BTreeMap<String, Vec<Document>> = BTreeMap::new();
    for document in documents.iter().filter(|document| document.matches(query)) {
        groups
            .entry(document.role.clone())
            .or_default()
            .push(document.clone());
    }
    groups
}

/// Percent-encodes a relative file path, keeping `/` separators.
fn encode_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
