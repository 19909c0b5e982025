use openjml::{CheckOutcome, Fingerprint, JmlDiagnostic};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Findings for one file together with the fingerprint of the content they were
/// computed from
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: Option<Fingerprint>,
    pub diagnostics: Vec<JmlDiagnostic>,
}

/// Last OpenJML findings, per source file
///
/// Fingerprint and findings of a file are always written together, so an entry is
/// either complete or absent.
#[derive(Debug, Default)]
pub struct DiagnosticCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl DiagnosticCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the entry for `path`; returns whether there was one
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Forget a deleted file
    pub fn remove(&mut self, path: &Path) -> bool {
        self.invalidate(path)
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Replace the whole cache with the outcome of a workspace run
    ///
    /// Every checked file gets an entry, even without findings, so clean files are
    /// not re-checked on the next request. Entries carry the fingerprints the run took
    /// before OpenJML started, so a file saved while OpenJML was running is stale
    /// afterwards. Files the run did not fingerprint never match.
    pub fn replace_all(&mut self, outcome: &CheckOutcome) {
        self.entries.clear();

        for file in &outcome.files {
            self.entries.insert(
                file.clone(),
                CacheEntry {
                    fingerprint: outcome.fingerprints.get(file).copied(),
                    diagnostics: Vec::new(),
                },
            );
        }

        for diagnostic in &outcome.diagnostics {
            self.entries
                .entry(diagnostic.path.clone())
                .or_insert_with(|| CacheEntry {
                    fingerprint: outcome.fingerprints.get(&diagnostic.path).copied(),
                    diagnostics: Vec::new(),
                })
                .diagnostics
                .push(diagnostic.clone());
        }

        tracing::debug!(files = self.entries.len(), "diagnostic cache replaced");
    }

    /// Cached findings for `path`, if they were computed from content with the
    /// `current` fingerprint
    ///
    /// A file without a fingerprint (unreadable or deleted) never matches.
    pub fn lookup(&self, path: &Path, current: Option<Fingerprint>) -> Option<&[JmlDiagnostic]> {
        let entry = self.entries.get(path)?;
        match (entry.fingerprint, current) {
            (Some(stored), Some(current)) if stored == current => Some(&entry.diagnostics),
            _ => None,
        }
    }

    /// Findings for `path` regardless of freshness
    pub fn diagnostics(&self, path: &Path) -> Vec<JmlDiagnostic> {
        self.entries
            .get(path)
            .map(|entry| entry.diagnostics.clone())
            .unwrap_or_default()
    }

    /// All cached files with their findings, ordered by path
    pub fn snapshot(&self) -> Vec<(PathBuf, Vec<JmlDiagnostic>)> {
        let mut files: Vec<_> = self
            .entries
            .iter()
            .map(|(path, entry)| (path.clone(), entry.diagnostics.clone()))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
