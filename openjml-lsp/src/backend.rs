use openjml::{Fingerprint, JmlDiagnostic, OpenJml, OpenJmlConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::cache::DiagnosticCache;
use crate::code_actions;
use crate::documents::Documents;
use crate::handlers;
use crate::utils::uri_to_path;

pub struct Backend {
    client: Client,
    roots: Arc<RwLock<Vec<PathBuf>>>,
    openjml: Arc<RwLock<OpenJml>>,
    cache: Arc<RwLock<DiagnosticCache>>,
    documents: Arc<RwLock<Documents>>,
    // One OpenJML process at a time
    run_lock: Arc<Mutex<()>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            roots: Arc::new(RwLock::new(Vec::new())),
            openjml: Arc::new(RwLock::new(OpenJml::new(OpenJmlConfig::default()))),
            cache: Arc::new(RwLock::new(DiagnosticCache::new())),
            documents: Arc::new(RwLock::new(Documents::new())),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn cached(&self, path: &Path) -> Option<Vec<JmlDiagnostic>> {
        let current = match tokio::fs::read(path).await {
            Ok(bytes) => Some(Fingerprint::of_bytes(&bytes)),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "cannot fingerprint file");
                None
            }
        };
        self.cache
            .read()
            .await
            .lookup(path, current)
            .map(<[JmlDiagnostic]>::to_vec)
    }

    /// Run OpenJML over the whole workspace and replace the cache
    ///
    /// Failures are reported to the client; the cache is left untouched then.
    async fn refresh(&self) -> bool {
        let roots = self.roots.read().await.clone();
        let openjml = self.openjml.read().await.clone();

        match openjml.check_workspace(&roots).await {
            Ok(outcome) => {
                for message in &outcome.messages {
                    self.client
                        .log_message(MessageType::WARNING, format!("OpenJML: {}", message))
                        .await;
                }
                self.cache.write().await.replace_all(&outcome);
                true
            }
            Err(err) => {
                tracing::error!(%err, "OpenJML run failed");
                self.client
                    .log_message(MessageType::ERROR, format!("OpenJML run failed: {}", err))
                    .await;
                false
            }
        }
    }

    /// Findings for one file, running OpenJML only when the cache is stale
    async fn file_diagnostics(&self, uri: &Url) -> Vec<JmlDiagnostic> {
        let Some(path) = uri_to_path(uri) else {
            tracing::debug!(%uri, "not a file URI, no diagnostics");
            return Vec::new();
        };

        if let Some(items) = self.cached(&path).await {
            tracing::info!(%uri, issues = items.len(), "serving cached diagnostics");
            return items;
        }

        let _guard = self.run_lock.lock().await;
        // Another request may have refreshed the cache while we waited
        if let Some(items) = self.cached(&path).await {
            return items;
        }

        tracing::info!(%uri, "cache is stale, running OpenJML");
        if !self.refresh().await {
            return Vec::new();
        }
        let items = self.cache.read().await.diagnostics(&path);
        tracing::info!(%uri, issues = items.len(), "fresh diagnostics");
        items
    }

    async fn invalidate(&self, uri: &Url) {
        if let Some(path) = uri_to_path(uri) {
            self.cache.write().await.invalidate(&path);
        }
    }

    async fn openjml_version(&self) -> openjml::Result<String> {
        let openjml = self.openjml.read().await.clone();
        openjml.version().await
    }
}

fn folder_paths(folders: &[WorkspaceFolder]) -> Vec<PathBuf> {
    folders
        .iter()
        .filter_map(|folder| uri_to_path(&folder.uri))
        .collect()
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let roots = match params.workspace_folders.as_deref() {
            Some(folders) if !folders.is_empty() => folder_paths(folders),
            _ => params
                .root_uri
                .as_ref()
                .and_then(uri_to_path)
                .into_iter()
                .collect(),
        };
        for root in &roots {
            tracing::info!(root = %root.display(), "workspace root");
        }

        if let Some(root) = roots.first() {
            match OpenJmlConfig::load(root) {
                Ok(Some(config)) => *self.openjml.write().await = OpenJml::new(config),
                Ok(None) => {}
                Err(err) => tracing::warn!(%err, "ignoring configuration file"),
            }
        }
        *self.roots.write().await = roots;

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "openjml-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                        resolve_provider: Some(true),
                        work_done_progress_options: WorkDoneProgressOptions::default(),
                    },
                )),
                diagnostic_provider: Some(DiagnosticServerCapabilities::Options(
                    DiagnosticOptions {
                        identifier: Some(handlers::DIAGNOSTIC_SOURCE.to_string()),
                        inter_file_dependencies: true,
                        workspace_diagnostics: true,
                        work_done_progress_options: WorkDoneProgressOptions::default(),
                    },
                )),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: None,
                }),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        match self.openjml_version().await {
            Ok(version) => {
                tracing::info!(%version, "OpenJML available");
                self.client
                    .log_message(MessageType::INFO, format!("OpenJML {}", version))
                    .await;
            }
            Err(err) => {
                tracing::error!(%err, "cannot load OpenJML");
                self.client
                    .log_message(
                        MessageType::ERROR,
                        format!("Error happened during loading OpenJML: {}", err),
                    )
                    .await;
            }
        }
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutdown requested");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        tracing::debug!(uri = %doc.uri, version = doc.version, "did_open");
        self.documents
            .write()
            .await
            .open(doc.uri, doc.version, doc.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        tracing::debug!(%uri, version, "did_change");

        self.invalidate(&uri).await;
        if let Some(change) = params.content_changes.into_iter().last() {
            self.documents.write().await.change(uri, version, change.text);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        tracing::debug!(uri = %params.text_document.uri, "did_save");
        self.invalidate(&params.text_document.uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        tracing::debug!(uri = %params.text_document.uri, "did_close");
        self.documents.write().await.close(&params.text_document.uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        tracing::info!("configuration changed");
        match OpenJmlConfig::from_settings(params.settings) {
            Ok(Some(config)) => *self.openjml.write().await = OpenJml::new(config),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%err, "keeping previous configuration");
                self.client
                    .log_message(
                        MessageType::WARNING,
                        format!("Invalid OpenJML settings: {}", err),
                    )
                    .await;
            }
        }
        self.cache.write().await.invalidate_all();
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let added = folder_paths(&params.event.added);
        let removed = folder_paths(&params.event.removed);
        tracing::info!(
            added = added.len(),
            removed = removed.len(),
            "workspace folders changed"
        );

        let mut roots = self.roots.write().await;
        roots.retain(|root| !removed.contains(root));
        for root in added {
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        drop(roots);

        self.cache.write().await.invalidate_all();
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let mut cache = self.cache.write().await;
        for change in params.changes {
            let Some(path) = uri_to_path(&change.uri) else {
                continue;
            };
            if change.typ == FileChangeType::CHANGED {
                cache.invalidate(&path);
            } else if change.typ == FileChangeType::DELETED {
                cache.remove(&path);
            }
        }
    }

    async fn diagnostic(
        &self,
        params: DocumentDiagnosticParams,
    ) -> Result<DocumentDiagnosticReportResult> {
        let items = self.file_diagnostics(&params.text_document.uri).await;
        Ok(handlers::document_report(&items))
    }

    async fn workspace_diagnostic(
        &self,
        _: WorkspaceDiagnosticParams,
    ) -> Result<WorkspaceDiagnosticReportResult> {
        {
            let _guard = self.run_lock.lock().await;
            self.refresh().await;
        }

        let files = self.cache.read().await.snapshot();
        let documents = self.documents.read().await;
        Ok(WorkspaceDiagnosticReportResult::Report(
            handlers::workspace_report(&files, &documents),
        ))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let actions = code_actions::get_code_actions(&params.text_document.uri, &params.context);

        if actions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(actions))
        }
    }

    async fn code_action_resolve(&self, action: CodeAction) -> Result<CodeAction> {
        let uri = action
            .data
            .clone()
            .and_then(|data| serde_json::from_value::<code_actions::SuppressWarning>(data).ok())
            .map(|data| data.uri);

        let Some(uri) = uri else {
            return Ok(action);
        };

        let open_text = self
            .documents
            .read()
            .await
            .get(&uri)
            .map(|doc| doc.text.clone());
        let text = match (open_text, uri_to_path(&uri)) {
            (Some(text), _) => Some(text),
            (None, Some(path)) => tokio::fs::read_to_string(path).await.ok(),
            (None, None) => None,
        };

        Ok(code_actions::resolve_code_action(action, text.as_deref()))
    }
}
