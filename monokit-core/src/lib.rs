//! Core library for the monokit workspace orchestrator.

pub mod agent;
pub mod argv;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gitactions;
pub mod gitbatch;
pub mod hooks;
pub mod locate;
pub mod manifest;
pub mod pipeline;
pub mod upgrade;

pub use agent::{PackageAgent, ShellAgent};
pub use argv::{Arguments, OptionSchema};
pub use catalog::Catalog;
pub use config::{Config, Scope, ScopeStack};
pub use error::{Error, Result};
pub use gitbatch::{
    run_batch, BatchAction, BatchMember, BatchOptions, BatchPolicy, GitBackend, GitStatus,
    GitStatusFile, ShellGit, DEFAULT_CONCURRENCY,
};
pub use hooks::{Gate, Handler, HookRegistry};
pub use locate::{LocateFilter, LocateOptions};
pub use manifest::{detect_indent, DepGroup, Manifest, MANIFEST_FILE};
pub use pipeline::{CommandEntry, Loader, Monorepo};
pub use upgrade::{HttpRegistry, MetadataFetcher, RemoteMetadata, UpgradeEngine, UpgradeOutcome};
