use std::collections::HashMap;
use std::path::Path;
use tower_lsp::lsp_types::Url;

use crate::utils::uri_to_path;

/// An editor buffer the client has opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDocument {
    pub version: i32,
    pub text: String,
}

/// Versions and contents of the documents currently open in the client
#[derive(Debug, Default)]
pub struct Documents {
    open: HashMap<Url, OpenDocument>,
}

impl Documents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, uri: Url, version: i32, text: String) {
        self.open.insert(uri, OpenDocument { version, text });
    }

    /// Record a full-content change
    pub fn change(&mut self, uri: Url, version: i32, text: String) {
        self.open.insert(uri, OpenDocument { version, text });
    }

    pub fn close(&mut self, uri: &Url) -> Option<OpenDocument> {
        self.open.remove(uri)
    }

    pub fn get(&self, uri: &Url) -> Option<&OpenDocument> {
        self.open.get(uri)
    }

    pub fn version(&self, uri: &Url) -> Option<i32> {
        self.open.get(uri).map(|doc| doc.version)
    }

    /// Version of the open document backed by `path`
    ///
    /// Clients do not always spell file URIs the way [`Url::from_file_path`] does
    /// (percent-encoding, drive letters), so the lookup compares paths.
    pub fn version_of_path(&self, path: &Path) -> Option<i32> {
        self.open
            .iter()
            .find(|(uri, _)| uri_to_path(uri).as_deref() == Some(path))
            .map(|(_, doc)| doc.version)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
