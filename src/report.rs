//! Parser for the textual report OpenJML prints.
//!
//! OpenJML reports in javac's format:
//!
//! ```text
//! /src/demo/Account.java:12: error: incompatible types: int cannot be converted to boolean
//!     //@ requires amount;
//!                  ^
//! 1 error
//! ```
//!
//! The line after a finding's header echoes the source and the caret below it marks
//! the column. Indented lines after the caret (`symbol: ...`, `location: ...`) belong
//! to the message.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::diagnostic::{DiagnosticKind, JmlDiagnostic};

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(.+?\.(?:java|jml)):(\d+):\s*((?i:mandatory warning|error|warning|note|verify)):\s?(.*)$",
    )
    .unwrap()
});
static TOOL_MESSAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i:error|warning):\s*(.+)$").unwrap());
static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\s+(?:errors?|warnings?|notes?|verification failures?)\s*$").unwrap()
});

/// Findings and free-standing tool messages extracted from one OpenJML run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub diagnostics: Vec<JmlDiagnostic>,
    /// Messages not attached to a file, e.g. `error: invalid flag: -foo`
    pub messages: Vec<String>,
}

struct Pending {
    diagnostic: JmlDiagnostic,
    extra: Vec<String>,
    caret_seen: bool,
}

impl Pending {
    fn finish(mut self) -> JmlDiagnostic {
        for line in self.extra {
            self.diagnostic.message.push('\n');
            self.diagnostic.message.push_str(line.trim_end());
        }
        self.diagnostic.message = self.diagnostic.message.trim_end().to_string();
        self.diagnostic
    }
}

/// Parse OpenJML output; relative paths are resolved against `cwd`
pub fn parse_report(text: &str, cwd: &Path) -> Report {
    let mut report = Report::default();
    let mut current: Option<Pending> = None;

    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');

        if let Some(caps) = HEADER_RE.captures(line) {
            if let Some(pending) = current.take() {
                report.diagnostics.push(pending.finish());
            }
            let path = PathBuf::from(&caps[1]);
            current = Some(Pending {
                diagnostic: JmlDiagnostic {
                    path: if path.is_absolute() { path } else { cwd.join(path) },
                    line: caps[2].parse().unwrap_or(1),
                    column: 1,
                    kind: DiagnosticKind::from_label(&caps[3]),
                    message: caps[4].to_string(),
                },
                extra: Vec::new(),
                caret_seen: false,
            });
            continue;
        }

        if let Some(caps) = TOOL_MESSAGE_RE.captures(line) {
            if let Some(pending) = current.take() {
                report.diagnostics.push(pending.finish());
            }
            report.messages.push(caps[1].trim().to_string());
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || SUMMARY_RE.is_match(trimmed) || trimmed.starts_with("Note: ") {
            if let Some(pending) = current.take() {
                report.diagnostics.push(pending.finish());
            }
            continue;
        }

        let Some(pending) = current.as_mut() else {
            tracing::trace!(line, "ignoring unattached output");
            continue;
        };

        if trimmed == "^" && !pending.caret_seen {
            let column = line.chars().take_while(|c| *c != '^').count() as u32 + 1;
            pending.diagnostic.column = column;
            pending.caret_seen = true;
            // The line above the caret is the echoed source, not message text
            pending.extra.pop();
            continue;
        }

        if pending.caret_seen && !line.starts_with(char::is_whitespace) {
            if let Some(pending) = current.take() {
                report.diagnostics.push(pending.finish());
            }
            continue;
        }

        pending.extra.push(if pending.caret_seen {
            trimmed.to_string()
        } else {
            line.to_string()
        });
    }

    if let Some(pending) = current.take() {
        report.diagnostics.push(pending.finish());
    }

    report
}
