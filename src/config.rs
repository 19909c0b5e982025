use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Name of the per-project configuration file looked up in the workspace root
pub const CONFIG_FILE_NAME: &str = ".openjml-lsp.yaml";

/// Environment variable holding the command used to launch OpenJML
pub const COMMAND_ENV: &str = "OPENJML";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Keys of [`OpenJmlConfig`] as they appear in client settings
const SETTINGS_KEYS: [&str; 6] = [
    "command",
    "mode",
    "classpath",
    "extraArgs",
    "timeoutSecs",
    "detectSourceRoots",
];

/// What OpenJML should do with the sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Parse and type-check JML specifications
    #[default]
    Check,
    /// Extended static checking
    Esc,
    /// Runtime assertion checking compilation
    Rac,
}

impl CheckMode {
    pub fn flag(self) -> &'static str {
        match self {
            CheckMode::Check => "-check",
            CheckMode::Esc => "-esc",
            CheckMode::Rac => "-rac",
        }
    }
}

/// Settings controlling how OpenJML is invoked
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenJmlConfig {
    /// Program plus leading arguments, e.g. `["java", "-jar", "libs/openjml.jar"]`
    pub command: Vec<String>,
    pub mode: CheckMode,
    pub classpath: Vec<String>,
    pub extra_args: Vec<String>,
    pub timeout_secs: u64,
    /// Pass `-sourcepath` built from the package layout of the sources
    pub detect_source_roots: bool,
}

impl Default for OpenJmlConfig {
    fn default() -> Self {
        Self {
            command: default_command(std::env::var(COMMAND_ENV).ok().as_deref()),
            mode: CheckMode::default(),
            classpath: Vec::new(),
            extra_args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            detect_source_roots: true,
        }
    }
}

fn default_command(env: Option<&str>) -> Vec<String> {
    let from_env: Vec<String> = env
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if from_env.is_empty() {
        vec!["openjml".to_string()]
    } else {
        from_env
    }
}

impl OpenJmlConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        // An empty file deserializes to null
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load `.openjml-lsp.yaml` from `dir`, if there is one
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        tracing::info!(path = %path.display(), "loaded configuration file");
        Self::from_yaml_str(&text).map(Some)
    }

    /// Build a configuration from a `workspace/didChangeConfiguration` payload
    ///
    /// Clients either send the section itself or wrap it in an `openjml` key.
    /// Returns `None` when the payload carries no OpenJML settings (for instance
    /// only sections of other tools), so a configuration loaded from file stays in
    /// effect.
    pub fn from_settings(settings: Value) -> Result<Option<Self>> {
        let section = match settings {
            Value::Object(mut map) if map.contains_key("openjml") => {
                map.remove("openjml").unwrap_or(Value::Null)
            }
            Value::Object(map) if !SETTINGS_KEYS.iter().any(|key| map.contains_key(*key)) => {
                return Ok(None);
            }
            other => other,
        };
        match &section {
            Value::Null => return Ok(None),
            Value::Object(map) if map.is_empty() => return Ok(None),
            _ => {}
        }
        Ok(Some(serde_json::from_value(section)?))
    }

    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    pub fn leading_args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
