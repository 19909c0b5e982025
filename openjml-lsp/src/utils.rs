//! Utility functions for LSP position and URI handling

use std::path::{Path, PathBuf};
use tower_lsp::lsp_types::Url;

/// Length of a line in UTF-16 code units, the unit LSP positions are counted in
pub fn utf16_len(line: &str) -> u32 {
    line.encode_utf16().count() as u32
}

/// Convert a `file://` URI into a filesystem path
///
/// Returns `None` for other schemes such as `untitled:`.
pub fn uri_to_path(uri: &Url) -> Option<PathBuf> {
    if uri.scheme() != "file" {
        return None;
    }
    uri.to_file_path().ok()
}

/// Convert an absolute filesystem path into a `file://` URI
pub fn path_to_uri(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}
