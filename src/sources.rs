use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

static PACKAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*package\s+([\w.]+)\s*;").unwrap());

/// Collect every `.java` file below the given roots, sorted and without duplicates
pub fn find_java_files<P: AsRef<Path>>(roots: &[P]) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();

    for root in roots {
        let root = root.as_ref();
        tracing::debug!(root = %root.display(), "scanning workspace folder");

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(root = %root.display(), %err, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && is_java_file(entry.path()) {
                files.insert(entry.into_path());
            }
        }
    }

    files.into_iter().collect()
}

fn is_java_file(path: &Path) -> bool {
    path.extension().map(|ext| ext == "java").unwrap_or(false)
}

/// The package declared by a compilation unit, if any
pub fn package_of(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| PACKAGE_RE.captures(line))
        .map(|caps| caps[1].to_string())
}

/// Directory the package hierarchy of `file` starts from
///
/// `src/main/java/com/example/App.java` declaring `package com.example;` has the
/// source root `src/main/java`. Files in the default package are their own root.
pub fn source_root(file: &Path, content: &str) -> Option<PathBuf> {
    let mut dir = file.parent()?.to_path_buf();
    let depth = package_of(content)
        .map(|package| package.split('.').count())
        .unwrap_or(0);

    for _ in 0..depth {
        dir = dir.parent()?.to_path_buf();
    }
    Some(dir)
}

/// Distinct source roots of the given files
///
/// Roots derived from a package declaration win: files below one are not read
/// again, and default-package roots nested inside one are dropped. A default-package
/// file elsewhere still contributes its own directory.
pub fn source_roots(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut package_roots: Vec<PathBuf> = Vec::new();
    let mut default_roots: Vec<PathBuf> = Vec::new();

    for file in files {
        if package_roots.iter().any(|root| file.starts_with(root)) {
            continue;
        }
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(file = %file.display(), %err, "cannot read source file");
                continue;
            }
        };
        let Some(root) = source_root(file, &content) else {
            continue;
        };
        let roots = if package_of(&content).is_some() {
            &mut package_roots
        } else {
            &mut default_roots
        };
        if !roots.contains(&root) {
            roots.push(root);
        }
    }

    default_roots.retain(|root| {
        !package_roots
            .iter()
            .any(|package_root| root.starts_with(package_root))
    });

    let mut roots = package_roots;
    roots.extend(default_roots);
    roots.sort();
    roots
}
