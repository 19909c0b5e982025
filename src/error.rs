use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while configuring or running OpenJML
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("OpenJML did not finish within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("no OpenJML command configured")]
    EmptyCommand,
    #[error("invalid configuration file: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("invalid client settings: {0}")]
    Settings(#[from] serde_json::Error),
    #[error("could not read an OpenJML version from: {0:?}")]
    NoVersion(String),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
