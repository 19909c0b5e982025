use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tower_lsp::lsp_types::*;

use crate::handlers::DIAGNOSTIC_SOURCE;
use crate::utils::utf16_len;

/// JML pragma silencing OpenJML warnings on the line it ends
pub const NOWARN_PRAGMA: &str = " //@ nowarn;";

/// Payload carried from `textDocument/codeAction` to `codeAction/resolve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressWarning {
    pub uri: Url,
    pub line: u32,
}

/// Get available code actions for the diagnostics in a request context
///
/// Every OpenJML warning gets a quick fix appending a `nowarn` pragma to its line.
/// The edit itself is computed on resolve.
///
/// # Arguments
/// * `uri` - Document the actions are requested for
/// * `context` - Diagnostics the client shows in the requested range
///
/// # Returns
/// Unresolved code actions, possibly empty
pub fn get_code_actions(uri: &Url, context: &CodeActionContext) -> Vec<CodeActionOrCommand> {
    let mut seen_lines = Vec::new();
    let mut actions = Vec::new();

    for diagnostic in &context.diagnostics {
        if diagnostic.source.as_deref() != Some(DIAGNOSTIC_SOURCE)
            || diagnostic.severity != Some(DiagnosticSeverity::WARNING)
        {
            continue;
        }

        let line = diagnostic.range.start.line;
        if seen_lines.contains(&line) {
            continue;
        }
        seen_lines.push(line);

        let data = SuppressWarning {
            uri: uri.clone(),
            line,
        };
        actions.push(CodeActionOrCommand::CodeAction(CodeAction {
            title: "Suppress OpenJML warning".to_string(),
            kind: Some(CodeActionKind::QUICKFIX),
            diagnostics: Some(vec![diagnostic.clone()]),
            data: serde_json::to_value(&data).ok(),
            ..Default::default()
        }));
    }

    actions
}

/// Fill in the edit of an action produced by [`get_code_actions`]
///
/// `content` is the current text of the document named in the action's data.
/// Actions without suitable data, whose line no longer exists, or whose line is
/// already suppressed are returned unchanged.
pub fn resolve_code_action(mut action: CodeAction, content: Option<&str>) -> CodeAction {
    let Some(data) = action
        .data
        .clone()
        .and_then(|value| serde_json::from_value::<SuppressWarning>(value).ok())
    else {
        return action;
    };
    let Some(content) = content else {
        return action;
    };
    let Some(line_text) = content.lines().nth(data.line as usize) else {
        return action;
    };

    let Some(edit) = pragma_edit(data.line, line_text) else {
        return action;
    };

    let mut changes = HashMap::new();
    changes.insert(data.uri, vec![edit]);
    action.edit = Some(WorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    });
    action
}

/// Edit placing a `nowarn` pragma on `line_text`, unless it already has one
///
/// A pragma appended after a `//` comment would be part of that comment, so it is
/// inserted before the comment instead. A line ending in a JML annotation gets the
/// bare pragma added to the annotation, ahead of any comment nested in it.
fn pragma_edit(line: u32, line_text: &str) -> Option<TextEdit> {
    if line_text.contains("//@ nowarn") {
        return None;
    }

    let at = |character: u32| Range {
        start: Position { line, character },
        end: Position { line, character },
    };

    let edit = match line_comment_start(line_text) {
        Some(start) if line_text[start..].starts_with("//@") => {
            let body = start + "//@".len();
            let nested = line_comment_start(&line_text[body..]).map(|offset| body + offset);
            let annotation = line_text[..nested.unwrap_or(line_text.len())].trim_end();
            if annotation.ends_with("nowarn;") {
                return None;
            }
            match nested {
                Some(end) => TextEdit {
                    range: at(utf16_len(&line_text[..end])),
                    new_text: "nowarn; ".to_string(),
                },
                None => TextEdit {
                    range: at(utf16_len(line_text)),
                    new_text: " nowarn;".to_string(),
                },
            }
        }
        Some(start) => TextEdit {
            range: at(utf16_len(&line_text[..start])),
            new_text: format!("{} ", NOWARN_PRAGMA.trim_start()),
        },
        None => TextEdit {
            range: at(utf16_len(line_text)),
            new_text: NOWARN_PRAGMA.to_string(),
        },
    };
    Some(edit)
}

/// Byte offset of the `//` starting a line comment, ignoring string and char literals
fn line_comment_start(line: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = line.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '/' if matches!(chars.peek(), Some((_, '/'))) => return Some(index),
                _ => {}
            },
        }
    }
    None
}
