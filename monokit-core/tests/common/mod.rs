#![allow(dead_code)]

//! Fake collaborators shared by the integration tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use monokit_core::{
    Error, GitBackend, GitStatus, MetadataFetcher, PackageAgent, RemoteMetadata, Result,
};

/// Recording git backend with a fixed directory-to-repository-root map.
#[derive(Default)]
pub struct FakeGit {
    pub roots: BTreeMap<PathBuf, PathBuf>,
    pub statuses: BTreeMap<PathBuf, GitStatus>,
    pub ahead: u32,
    pub log: Mutex<Vec<String>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, dir: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(dir.into(), root.into());
        self
    }

    pub fn with_status(mut self, dir: impl Into<PathBuf>, status: GitStatus) -> Self {
        self.statuses.insert(dir.into(), status);
        self
    }

    pub fn with_ahead(mut self, ahead: u32) -> Self {
        self.ahead = ahead;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, op: &str, dir: &Path) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{op} {}", dir.display()));
    }
}

#[async_trait]
impl GitBackend for FakeGit {
    async fn repo_root(&self, dir: &Path) -> Result<Option<PathBuf>> {
        Ok(self.roots.get(dir).cloned())
    }

    async fn status(&self, dir: &Path) -> Result<GitStatus> {
        self.record("status", dir);
        Ok(self.statuses.get(dir).cloned().unwrap_or_default())
    }

    async fn add_all(&self, dir: &Path) -> Result<()> {
        self.record("add-all", dir);
        Ok(())
    }

    async fn add(&self, dir: &Path, files: &[String]) -> Result<()> {
        self.record(&format!("add[{}]", files.join(",")), dir);
        Ok(())
    }

    async fn commit(&self, dir: &Path, message: &str) -> Result<bool> {
        self.record(&format!("commit({message})"), dir);
        Ok(true)
    }

    async fn push(&self, dir: &Path, _remote: Option<&str>, _branch: Option<&str>) -> Result<()> {
        self.record("push", dir);
        Ok(())
    }

    async fn fetch(&self, dir: &Path) -> Result<()> {
        self.record("fetch", dir);
        Ok(())
    }

    async fn pull(&self, dir: &Path) -> Result<()> {
        self.record("pull", dir);
        Ok(())
    }

    async fn ahead_count(&self, dir: &Path) -> Result<u32> {
        self.record("ahead", dir);
        Ok(self.ahead)
    }
}

/// Recording package agent returning a fixed exit code.
pub struct FakeAgent {
    pub code: i32,
    pub log: Mutex<Vec<String>>,
}

impl FakeAgent {
    pub fn new(code: i32) -> Self {
        Self {
            code,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageAgent for FakeAgent {
    fn name(&self) -> &str {
        "fake"
    }

    async fn install(&self, dir: &Path) -> Result<i32> {
        self.log
            .lock()
            .unwrap()
            .push(format!("install {}", dir.display()));
        Ok(self.code)
    }

    async fn run_script(&self, dir: &Path, script: &str) -> Result<i32> {
        self.log
            .lock()
            .unwrap()
            .push(format!("run {script} {}", dir.display()));
        Ok(self.code)
    }
}

/// Static registry answering from a prepared metadata map.
#[derive(Default)]
pub struct FakeRegistry {
    pub remotes: BTreeMap<String, RemoteMetadata>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, name: &str, remote: RemoteMetadata) -> Self {
        self.remotes.insert(name.to_string(), remote);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataFetcher for FakeRegistry {
    async fn fetch(&self, name: &str) -> Result<RemoteMetadata> {
        self.requests.lock().unwrap().push(name.to_string());
        self.remotes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Registry(format!("{name}: not found")))
    }
}
