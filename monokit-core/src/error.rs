//! Error types and result aliases.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed manifest in {path}: {error}")]
    Manifest {
        path: String,
        error: serde_json::Error,
    },

    #[error("invalid config in {path}: {error}")]
    Config {
        path: String,
        error: Box<toml::de::Error>,
    },

    #[error("cannot find workspace \"{0}\"")]
    WorkspaceNotFound(String),

    #[error("ambiguous workspace \"{pattern}\": {candidates}")]
    AmbiguousWorkspace { pattern: String, candidates: String },

    #[error("cannot find workspace {path} resolved by {alias}")]
    AliasTarget { alias: String, path: String },

    #[error("invalid pattern \"{pattern}\": {error}")]
    Pattern { pattern: String, error: regex::Error },

    #[error("invalid workspace glob \"{pattern}\": {error}")]
    WorkspaceGlob {
        pattern: String,
        error: glob::PatternError,
    },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0}")]
    Usage(String),

    #[error("git: {0}")]
    Git(String),

    #[error("package agent: {0}")]
    Agent(String),

    #[error("registry: {0}")]
    Registry(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
