use openjml::{DiagnosticKind, JmlDiagnostic};
use std::path::PathBuf;
use tower_lsp::lsp_types::*;

use crate::documents::Documents;
use crate::utils::path_to_uri;

/// `source` attached to every diagnostic this server publishes
pub const DIAGNOSTIC_SOURCE: &str = "openjml";

/// Width of the highlighted range, in characters
///
/// OpenJML reports unreliable end positions, so findings are underlined from their
/// start column over a fixed width.
pub const HIGHLIGHT_WIDTH: u32 = 10;

/// Convert an OpenJML finding into an LSP diagnostic
pub fn to_lsp_diagnostic(diagnostic: &JmlDiagnostic) -> Diagnostic {
    let line = diagnostic.line.saturating_sub(1);
    let column = diagnostic.column.saturating_sub(1);

    let severity = match diagnostic.kind {
        DiagnosticKind::Error => DiagnosticSeverity::ERROR,
        DiagnosticKind::Warning | DiagnosticKind::MandatoryWarning => {
            DiagnosticSeverity::WARNING
        }
        DiagnosticKind::Note => DiagnosticSeverity::HINT,
        DiagnosticKind::Other => DiagnosticSeverity::INFORMATION,
    };

    Diagnostic {
        range: Range {
            start: Position {
                line,
                character: column,
            },
            end: Position {
                line,
                character: column.saturating_add(HIGHLIGHT_WIDTH),
            },
        },
        severity: Some(severity),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

fn full_report(items: &[JmlDiagnostic]) -> FullDocumentDiagnosticReport {
    FullDocumentDiagnosticReport {
        result_id: None,
        items: items.iter().map(to_lsp_diagnostic).collect(),
    }
}

/// Handle the result of a `textDocument/diagnostic` request
pub fn document_report(items: &[JmlDiagnostic]) -> DocumentDiagnosticReportResult {
    DocumentDiagnosticReportResult::Report(DocumentDiagnosticReport::Full(
        RelatedFullDocumentDiagnosticReport {
            related_documents: None,
            full_document_diagnostic_report: full_report(items),
        },
    ))
}

/// Build a `workspace/diagnostic` report with one full report per file
///
/// Files open in the client carry the version of their buffer. Paths that cannot
/// be expressed as a URI are skipped.
pub fn workspace_report(
    files: &[(PathBuf, Vec<JmlDiagnostic>)],
    documents: &Documents,
) -> WorkspaceDiagnosticReport {
    let items: Vec<WorkspaceDocumentDiagnosticReport> = files
        .iter()
        .filter_map(|(path, diagnostics)| {
            let uri = path_to_uri(path)?;
            Some(WorkspaceDocumentDiagnosticReport::Full(
                WorkspaceFullDocumentDiagnosticReport {
                    uri,
                    version: documents.version_of_path(path).map(i64::from),
                    full_document_diagnostic_report: full_report(diagnostics),
                },
            ))
        })
        .collect();

    let issues: usize = files.iter().map(|(_, diagnostics)| diagnostics.len()).sum();
    tracing::info!(files = items.len(), issues, "workspace diagnostic report");

    WorkspaceDiagnosticReport { items }
}
