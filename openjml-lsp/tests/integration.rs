#![cfg(unix)]

use openjml_lsp::transport;
use serde_json::{json, Value};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tower_lsp::lsp_types::Url;

struct TestClient {
    reader: BufReader<Box<dyn AsyncRead + Unpin + Send>>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    next_id: i64,
}

impl TestClient {
    /// Client of a server session running in memory
    fn start() -> Self {
        let (client_io, server_io) = tokio::io::duplex(1 << 16);
        let (server_read, server_write) = tokio::io::split(server_io);
        tokio::spawn(transport::serve(server_read, server_write));

        let (client_read, client_write) = tokio::io::split(client_io);
        Self::over(client_read, client_write)
    }

    fn over(
        read: impl AsyncRead + Unpin + Send + 'static,
        write: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Self {
        Self {
            reader: BufReader::new(Box::new(read)),
            writer: Box::new(write),
            next_id: 1,
        }
    }

    fn over_tcp(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self::over(read, write)
    }

    async fn send(&mut self, message: Value) {
        let body = message.to_string();
        let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        self.writer.write_all(framed.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn receive(&mut self) -> Value {
        let mut length = 0usize;
        loop {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.strip_prefix("Content-Length: ") {
                length = value.parse().unwrap();
            }
        }
        let mut body = vec![0u8; length];
        self.reader.read_exact(&mut body).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        let mut message = json!({ "jsonrpc": "2.0", "id": id, "method": method });
        if !params.is_null() {
            message["params"] = params;
        }
        self.send(message).await;

        // Skip notifications such as window/logMessage
        loop {
            let message = self.receive().await;
            if message.get("method").is_none() && message["id"] == json!(id) {
                assert!(message.get("error").is_none(), "error: {}", message);
                return message["result"].clone();
            }
        }
    }

    async fn notify(&mut self, method: &str, params: Value) {
        self.send(json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await;
        // The server handles messages concurrently; let the notification land first
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

struct Fixture {
    _workspace: tempfile::TempDir,
    tools: tempfile::TempDir,
    root: PathBuf,
    source: PathBuf,
    runs: PathBuf,
}

/// Write a fake OpenJML that logs each run to `runs` and reports an error in
/// `demo/Account.java` when its working directory has that file
fn fake_openjml(dir: &Path, name: &str, runs: &Path) -> PathBuf {
    let script = dir.join(name);
    fs::write(
        &script,
        format!(
            r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "OpenJML-test"
  exit 0
fi
echo run >> "{runs}"
[ -f demo/Account.java ] || exit 0
cat >&2 <<'EOF'
demo/Account.java:3: error: incompatible types: int cannot be converted to boolean
  //@ requires amount;
               ^
1 error
EOF
exit 1
"#,
            runs = runs.display()
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

/// A workspace with one Java file and a fake OpenJML configured to report an error in it
fn fixture() -> Fixture {
    let workspace = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let root = workspace.path().to_path_buf();

    let package = root.join("demo");
    fs::create_dir_all(&package).unwrap();
    let source = package.join("Account.java");
    fs::write(
        &source,
        "package demo;\nclass Account {\n  //@ requires amount;\n  void deposit(int amount) {}\n}\n",
    )
    .unwrap();

    let runs = tools.path().join("runs.log");
    let script = fake_openjml(tools.path(), "fake-openjml", &runs);

    fs::write(
        root.join(".openjml-lsp.yaml"),
        format!("command: [\"{}\"]\ntimeoutSecs: 10\n", script.display()),
    )
    .unwrap();

    Fixture {
        _workspace: workspace,
        tools,
        root,
        source,
        runs,
    }
}

fn run_count(runs: &Path) -> usize {
    fs::read_to_string(runs)
        .map(|log| log.lines().count())
        .unwrap_or(0)
}

async fn initialize(client: &mut TestClient, root: &Path) -> Value {
    let root_uri = Url::from_file_path(root).unwrap();
    let result = client
        .request(
            "initialize",
            json!({
                "capabilities": {},
                "workspaceFolders": [{ "uri": root_uri, "name": "workspace" }]
            }),
        )
        .await;
    client.notify("initialized", json!({})).await;
    result
}

#[tokio::test]
async fn advertises_pull_diagnostics() {
    let fixture = fixture();
    let mut client = TestClient::start();

    let result = initialize(&mut client, &fixture.root).await;
    let capabilities = &result["capabilities"];

    assert_eq!(capabilities["textDocumentSync"], json!(1));
    assert_eq!(capabilities["diagnosticProvider"]["workspaceDiagnostics"], json!(true));
    assert_eq!(capabilities["diagnosticProvider"]["interFileDependencies"], json!(true));
    assert_eq!(capabilities["codeActionProvider"]["resolveProvider"], json!(true));
    assert_eq!(result["serverInfo"]["name"], json!("openjml-lsp"));

    client.request("shutdown", Value::Null).await;
}

#[tokio::test]
async fn document_diagnostics_are_cached_until_change() {
    let fixture = fixture();
    let mut client = TestClient::start();
    initialize(&mut client, &fixture.root).await;

    let uri = Url::from_file_path(&fixture.source).unwrap();
    let params = json!({ "textDocument": { "uri": uri } });

    let report = client.request("textDocument/diagnostic", params.clone()).await;
    assert_eq!(report["kind"], json!("full"));
    let items = report["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["source"], json!("openjml"));
    assert_eq!(items[0]["severity"], json!(1));
    assert_eq!(items[0]["range"]["start"], json!({ "line": 2, "character": 15 }));
    assert_eq!(run_count(&fixture.runs), 1);

    // Unchanged file: answered from the cache
    let report = client.request("textDocument/diagnostic", params.clone()).await;
    assert_eq!(report["items"].as_array().unwrap().len(), 1);
    assert_eq!(run_count(&fixture.runs), 1);

    client
        .notify(
            "textDocument/didOpen",
            json!({ "textDocument": {
                "uri": uri, "languageId": "java", "version": 1, "text": ""
            }}),
        )
        .await;
    client
        .notify(
            "textDocument/didChange",
            json!({
                "textDocument": { "uri": uri, "version": 2 },
                "contentChanges": [{ "text": "package demo;" }]
            }),
        )
        .await;

    client.request("textDocument/diagnostic", params).await;
    assert_eq!(run_count(&fixture.runs), 2);

    client.request("shutdown", Value::Null).await;
}

#[tokio::test]
async fn workspace_diagnostics_report_every_file() {
    let fixture = fixture();
    fs::write(fixture.root.join("demo/Clean.java"), "package demo;\nclass Clean {}\n").unwrap();
    let mut client = TestClient::start();
    initialize(&mut client, &fixture.root).await;

    let uri = Url::from_file_path(&fixture.source).unwrap();
    client
        .notify(
            "textDocument/didOpen",
            json!({ "textDocument": {
                "uri": uri, "languageId": "java", "version": 3, "text": ""
            }}),
        )
        .await;

    let report = client
        .request("workspace/diagnostic", json!({ "previousResultIds": [] }))
        .await;
    let items = report["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);

    let account = items
        .iter()
        .find(|item| item["uri"] == json!(uri))
        .expect("report for Account.java");
    assert_eq!(account["kind"], json!("full"));
    assert_eq!(account["version"], json!(3));
    assert_eq!(account["items"].as_array().unwrap().len(), 1);

    let clean = items
        .iter()
        .find(|item| item["uri"] != json!(uri))
        .unwrap();
    assert_eq!(clean["version"], Value::Null);
    assert!(clean["items"].as_array().unwrap().is_empty());

    client.request("shutdown", Value::Null).await;
}

#[tokio::test]
async fn watched_file_changes_invalidate_the_cache() {
    let fixture = fixture();
    let mut client = TestClient::start();
    initialize(&mut client, &fixture.root).await;

    let uri = Url::from_file_path(&fixture.source).unwrap();
    let params = json!({ "textDocument": { "uri": uri } });

    client.request("textDocument/diagnostic", params.clone()).await;
    assert_eq!(run_count(&fixture.runs), 1);

    client
        .notify(
            "workspace/didChangeWatchedFiles",
            json!({ "changes": [{ "uri": uri, "type": 2 }] }),
        )
        .await;
    client.request("textDocument/diagnostic", params.clone()).await;
    assert_eq!(run_count(&fixture.runs), 2);

    client
        .notify("workspace/didChangeConfiguration", json!({ "settings": {} }))
        .await;
    client.request("textDocument/diagnostic", params).await;
    assert_eq!(run_count(&fixture.runs), 3);

    client.request("shutdown", Value::Null).await;
}

#[tokio::test]
async fn saving_a_document_invalidates_its_findings() {
    let fixture = fixture();
    let mut client = TestClient::start();
    initialize(&mut client, &fixture.root).await;

    let uri = Url::from_file_path(&fixture.source).unwrap();
    let params = json!({ "textDocument": { "uri": uri } });

    client.request("textDocument/diagnostic", params.clone()).await;
    client.request("textDocument/diagnostic", params.clone()).await;
    assert_eq!(run_count(&fixture.runs), 1);

    client
        .notify("textDocument/didSave", json!({ "textDocument": { "uri": uri } }))
        .await;
    let report = client.request("textDocument/diagnostic", params).await;
    assert_eq!(report["items"].as_array().unwrap().len(), 1);
    assert_eq!(run_count(&fixture.runs), 2);

    client.request("shutdown", Value::Null).await;
}

#[tokio::test]
async fn workspace_folders_can_be_added_and_removed() {
    let fixture = fixture();
    let extra = tempfile::tempdir().unwrap();
    let extra_source = extra.path().join("Extra.java");
    fs::write(&extra_source, "class Extra {}\n").unwrap();
    let extra_uri = Url::from_file_path(extra.path()).unwrap();
    let extra_source_uri = Url::from_file_path(&extra_source).unwrap();
    let root_uri = Url::from_file_path(&fixture.root).unwrap();

    let mut client = TestClient::start();
    initialize(&mut client, &fixture.root).await;

    let uri = Url::from_file_path(&fixture.source).unwrap();
    let params = json!({ "textDocument": { "uri": uri } });
    client.request("textDocument/diagnostic", params.clone()).await;
    assert_eq!(run_count(&fixture.runs), 1);

    client
        .notify(
            "workspace/didChangeWorkspaceFolders",
            json!({ "event": {
                "added": [{ "uri": extra_uri, "name": "extra" }],
                "removed": []
            }}),
        )
        .await;

    // The folder change dropped the cached findings
    client.request("textDocument/diagnostic", params).await;
    assert_eq!(run_count(&fixture.runs), 2);

    let report = client
        .request("workspace/diagnostic", json!({ "previousResultIds": [] }))
        .await;
    let uris: Vec<Value> = report["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["uri"].clone())
        .collect();
    assert_eq!(uris.len(), 2);
    assert!(uris.contains(&json!(extra_source_uri)));
    assert!(uris.contains(&json!(uri)));

    client
        .notify(
            "workspace/didChangeWorkspaceFolders",
            json!({ "event": {
                "added": [],
                "removed": [{ "uri": root_uri, "name": "workspace" }]
            }}),
        )
        .await;

    let report = client
        .request("workspace/diagnostic", json!({ "previousResultIds": [] }))
        .await;
    let items = report["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["uri"], json!(extra_source_uri));
    assert!(items[0]["items"].as_array().unwrap().is_empty());

    client.request("shutdown", Value::Null).await;
}

#[tokio::test]
async fn configuration_change_swaps_the_command() {
    let fixture = fixture();
    let other_runs = fixture.tools.path().join("other-runs.log");
    let other = fake_openjml(fixture.tools.path(), "other-openjml", &other_runs);

    let mut client = TestClient::start();
    initialize(&mut client, &fixture.root).await;

    let uri = Url::from_file_path(&fixture.source).unwrap();
    let params = json!({ "textDocument": { "uri": uri } });
    client.request("textDocument/diagnostic", params.clone()).await;
    assert_eq!(run_count(&fixture.runs), 1);

    // Settings of other tools keep the configuration file in effect
    client
        .notify(
            "workspace/didChangeConfiguration",
            json!({ "settings": { "java": { "home": "/opt/jdk" } } }),
        )
        .await;
    client.request("textDocument/diagnostic", params.clone()).await;
    assert_eq!(run_count(&fixture.runs), 2);
    assert_eq!(run_count(&other_runs), 0);

    client
        .notify(
            "workspace/didChangeConfiguration",
            json!({ "settings": { "openjml": {
                "command": [other.display().to_string()],
                "timeoutSecs": 10
            }}}),
        )
        .await;
    let report = client.request("textDocument/diagnostic", params).await;
    assert_eq!(report["items"].as_array().unwrap().len(), 1);
    assert_eq!(run_count(&fixture.runs), 2);
    assert_eq!(run_count(&other_runs), 1);

    client.request("shutdown", Value::Null).await;
}

#[tokio::test]
async fn code_actions_resolve_against_buffer_or_disk() {
    let fixture = fixture();
    let mut client = TestClient::start();
    initialize(&mut client, &fixture.root).await;
    let uri = Url::from_file_path(&fixture.source).unwrap();

    let warning = json!({
        "range": {
            "start": { "line": 2, "character": 15 },
            "end": { "line": 2, "character": 25 }
        },
        "severity": 2,
        "source": "openjml",
        "message": "The prover cannot establish an assertion"
    });
    let actions = client
        .request(
            "textDocument/codeAction",
            json!({
                "textDocument": { "uri": uri },
                "range": warning["range"].clone(),
                "context": { "diagnostics": [warning] }
            }),
        )
        .await;
    let actions = actions.as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["data"], json!({ "uri": uri, "line": 2 }));

    // Not open: resolved against the file on disk, where line 2 is a JML annotation
    let resolved = client
        .request("codeAction/resolve", actions[0].clone())
        .await;
    let edits = &resolved["edit"]["changes"][uri.as_str()];
    assert_eq!(edits[0]["newText"], json!(" nowarn;"));
    assert_eq!(edits[0]["range"]["start"], json!({ "line": 2, "character": 22 }));

    client
        .notify(
            "textDocument/didOpen",
            json!({ "textDocument": {
                "uri": uri, "languageId": "java", "version": 1,
                "text": "package demo;\nclass Account { int balance; }\n"
            }}),
        )
        .await;

    // Open: resolved against the buffer
    let action = json!({
        "title": "Suppress OpenJML warning",
        "kind": "quickfix",
        "data": { "uri": uri, "line": 1 }
    });
    let resolved = client.request("codeAction/resolve", action).await;
    let edits = &resolved["edit"]["changes"][uri.as_str()];
    assert_eq!(edits[0]["newText"], json!(" //@ nowarn;"));
    assert_eq!(edits[0]["range"]["start"], json!({ "line": 1, "character": 30 }));

    client.request("shutdown", Value::Null).await;
}

#[tokio::test]
async fn tcp_server_runs_a_session_per_connection() {
    let fixture = fixture();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(transport::accept_loop(listener));

    let mut first = TestClient::over_tcp(TcpStream::connect(address).await.unwrap());
    let mut second = TestClient::over_tcp(TcpStream::connect(address).await.unwrap());

    // Each connection is initialized on its own
    let result = initialize(&mut first, &fixture.root).await;
    assert_eq!(result["serverInfo"]["name"], json!("openjml-lsp"));
    let result = initialize(&mut second, &fixture.root).await;
    assert_eq!(result["serverInfo"]["name"], json!("openjml-lsp"));

    let uri = Url::from_file_path(&fixture.source).unwrap();
    let params = json!({ "textDocument": { "uri": uri } });
    let report = first.request("textDocument/diagnostic", params.clone()).await;
    assert_eq!(report["items"].as_array().unwrap().len(), 1);

    // Sessions do not share a cache
    second.request("textDocument/diagnostic", params).await;
    assert_eq!(run_count(&fixture.runs), 2);

    first.request("shutdown", Value::Null).await;
    second.request("shutdown", Value::Null).await;
}

#[tokio::test]
async fn client_mode_dials_the_editor() {
    let fixture = fixture();
    let editor = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = editor.local_addr().unwrap().port();
    tokio::spawn(transport::connect(port));

    let (stream, _) = editor.accept().await.unwrap();
    let mut client = TestClient::over_tcp(stream);

    let result = initialize(&mut client, &fixture.root).await;
    assert_eq!(result["capabilities"]["textDocumentSync"], json!(1));

    client.request("shutdown", Value::Null).await;
}
