use std::path::PathBuf;

/// Severity class of an OpenJML finding, following javac's diagnostic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Error,
    Warning,
    MandatoryWarning,
    Note,
    Other,
}

impl DiagnosticKind {
    /// Map the label printed by OpenJML (`error`, `warning`, ...) to a kind
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "error" => DiagnosticKind::Error,
            "warning" | "verify" => DiagnosticKind::Warning,
            "mandatory warning" => DiagnosticKind::MandatoryWarning,
            "note" => DiagnosticKind::Note,
            _ => DiagnosticKind::Other,
        }
    }
}

/// A single finding reported by OpenJML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JmlDiagnostic {
    pub path: PathBuf,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
    pub kind: DiagnosticKind,
    pub message: String,
}
