//! Package manager invocation seam.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// The package manager a command shells out to for installs and scripts.
#[async_trait]
pub trait PackageAgent: Send + Sync {
    fn name(&self) -> &str;
    /// Runs the agent's install, returning its exit code.
    async fn install(&self, dir: &Path) -> Result<i32>;
    /// Runs a manifest script, returning its exit code.
    async fn run_script(&self, dir: &Path, script: &str) -> Result<i32>;
}

/// Shell agent detected from the lockfile at the workspace root.
#[derive(Debug, Clone)]
pub struct ShellAgent {
    agent: String,
}

impl ShellAgent {
    pub fn detect(cwd: &Path) -> Self {
        let agent = if cwd.join("pnpm-lock.yaml").exists() {
            "pnpm"
        } else if cwd.join("yarn.lock").exists() {
            "yarn"
        } else {
            "npm"
        };
        debug!(agent, "package agent detected");
        Self {
            agent: agent.to_string(),
        }
    }

    async fn spawn(&self, dir: &Path, args: &[&str]) -> Result<i32> {
        let status = Command::new(&self.agent)
            .args(args)
            .current_dir(dir)
            .status()
            .await
            .map_err(|error| Error::Agent(format!("{} {}: {error}", self.agent, args.join(" "))))?;
        Ok(status.code().unwrap_or(1))
    }
}

#[async_trait]
impl PackageAgent for ShellAgent {
    fn name(&self) -> &str {
        &self.agent
    }

    async fn install(&self, dir: &Path) -> Result<i32> {
        // yarn installs with no subcommand at all.
        if self.agent == "yarn" {
            self.spawn(dir, &[]).await
        } else {
            self.spawn(dir, &["install"]).await
        }
    }

    async fn run_script(&self, dir: &Path, script: &str) -> Result<i32> {
        self.spawn(dir, &["run", script]).await
    }
}
