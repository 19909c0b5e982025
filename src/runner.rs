use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::OpenJmlConfig;
use crate::diagnostic::JmlDiagnostic;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::report::parse_report;
use crate::sources;

const PATH_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// Result of checking a set of files
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    /// Every file handed to OpenJML
    pub files: Vec<PathBuf>,
    /// Content fingerprints of `files`, taken before OpenJML was started
    ///
    /// Files that could not be read are missing.
    pub fingerprints: HashMap<PathBuf, Fingerprint>,
    pub diagnostics: Vec<JmlDiagnostic>,
    /// Output lines not tied to a file
    pub messages: Vec<String>,
    /// `None` when nothing was run or the process was killed by a signal
    pub exit_code: Option<i32>,
}

/// Launches the OpenJML toolchain as an external process
#[derive(Debug, Clone)]
pub struct OpenJml {
    config: OpenJmlConfig,
}

struct Captured {
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
}

impl OpenJml {
    pub fn new(config: OpenJmlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OpenJmlConfig {
        &self.config
    }

    /// Version string reported by `openjml -version`
    pub async fn version(&self) -> Result<String> {
        let mut args: Vec<String> = self.config.leading_args().to_vec();
        args.push("-version".to_string());

        let captured = self.run(&args, None).await?;
        first_line(&captured.stdout)
            .or_else(|| first_line(&captured.stderr))
            .ok_or_else(|| Error::NoVersion(format!("{}{}", captured.stdout, captured.stderr)))
    }

    /// Arguments passed to the OpenJML program, excluding the program itself
    pub fn command_line(&self, files: &[PathBuf], source_roots: &[PathBuf]) -> Vec<String> {
        let mut args: Vec<String> = self.config.leading_args().to_vec();
        args.push(self.config.mode.flag().to_string());

        if !self.config.classpath.is_empty() {
            args.push("-classpath".to_string());
            args.push(self.config.classpath.join(PATH_SEPARATOR));
        }
        if !source_roots.is_empty() {
            args.push("-sourcepath".to_string());
            args.push(
                source_roots
                    .iter()
                    .map(|root| root.display().to_string())
                    .collect::<Vec<_>>()
                    .join(PATH_SEPARATOR),
            );
        }

        args.extend(self.config.extra_args.iter().cloned());
        args.extend(files.iter().map(|file| file.display().to_string()));
        args
    }

    /// Run OpenJML over `files` with `cwd` as working directory
    pub async fn check(&self, files: &[PathBuf], cwd: &Path) -> Result<CheckOutcome> {
        if files.is_empty() {
            tracing::info!("no Java files to check");
            return Ok(CheckOutcome::default());
        }

        let detect_roots = self.config.detect_source_roots;
        let scanned = files.to_vec();
        let (fingerprints, source_roots) = tokio::task::spawn_blocking(move || {
            let fingerprints: HashMap<PathBuf, Fingerprint> = scanned
                .iter()
                .filter_map(|file| Some((file.clone(), Fingerprint::try_of_file(file)?)))
                .collect();
            let roots = if detect_roots {
                sources::source_roots(&scanned)
            } else {
                Vec::new()
            };
            (fingerprints, roots)
        })
        .await?;
        let args = self.command_line(files, &source_roots);

        tracing::info!(files = files.len(), mode = ?self.config.mode, "running OpenJML");
        let captured = self.run(&args, Some(cwd)).await?;

        // javac writes its report to stderr; older OpenJML builds use stdout
        let mut output = captured.stderr;
        if !captured.stdout.is_empty() {
            output.push('\n');
            output.push_str(&captured.stdout);
        }
        let report = parse_report(&output, cwd);

        for message in &report.messages {
            tracing::warn!(%message, "OpenJML reported a problem");
        }
        tracing::info!(
            findings = report.diagnostics.len(),
            exit_code = ?captured.exit_code,
            "OpenJML finished"
        );

        Ok(CheckOutcome {
            files: files.to_vec(),
            fingerprints,
            diagnostics: report.diagnostics,
            messages: report.messages,
            exit_code: captured.exit_code,
        })
    }

    /// Check every Java file below the given workspace roots
    pub async fn check_workspace(&self, roots: &[PathBuf]) -> Result<CheckOutcome> {
        let scanned = roots.to_vec();
        let files = tokio::task::spawn_blocking(move || sources::find_java_files(&scanned)).await?;
        for file in &files {
            tracing::debug!(file = %file.display(), "found Java file");
        }

        let cwd = match roots.first() {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };
        self.check(&files, &cwd).await
    }

    async fn run(&self, args: &[String], cwd: Option<&Path>) -> Result<Captured> {
        let program = self.config.program().ok_or(Error::EmptyCommand)?;
        tracing::debug!(program, ?args, "spawning OpenJML");

        let mut command = Command::new(program);
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        let child = command.spawn().map_err(|source| Error::Spawn {
            program: program.to_string(),
            source,
        })?;

        let limit = self.config.timeout();
        let output = timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(limit))??;

        Ok(Captured {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
