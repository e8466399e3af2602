//! Git batch execution: repository grouping and concurrency policies.
//!
//! Targets are grouped by the physical repository that contains them, then a
//! pluggable action runs over each group under one of three policies. A
//! failing action never cancels its siblings; it is reported, counted as a
//! failure and contained at its own boundary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use owo_colors::OwoColorize;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Bound on concurrently running batch tasks.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// How the members of one repository group are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Every member's action runs as an independent concurrent task.
    Parallel,
    /// Members run one at a time, in original order.
    Sequential,
    /// Only the first member runs, representing the whole group. For
    /// operations meaningless to repeat per physical repository.
    Single,
}

/// One file reported by `git status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitStatusFile {
    pub index: char,
    pub working_dir: char,
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct GitStatus {
    pub files: Vec<GitStatusFile>,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.files.is_empty()
    }
}

/// Version-control executor the batch runner talks to.
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Root of the repository enclosing `dir`, or `None` outside any.
    async fn repo_root(&self, dir: &Path) -> Result<Option<PathBuf>>;
    /// Status of `dir`'s subtree, paths relative to `dir`.
    async fn status(&self, dir: &Path) -> Result<GitStatus>;
    async fn add_all(&self, dir: &Path) -> Result<()>;
    async fn add(&self, dir: &Path, files: &[String]) -> Result<()>;
    /// Commits staged changes; `false` when there was nothing to commit.
    async fn commit(&self, dir: &Path, message: &str) -> Result<bool>;
    async fn push(&self, dir: &Path, remote: Option<&str>, branch: Option<&str>) -> Result<()>;
    async fn fetch(&self, dir: &Path) -> Result<()>;
    async fn pull(&self, dir: &Path) -> Result<()>;
    /// Commits on HEAD not yet on its upstream.
    async fn ahead_count(&self, dir: &Path) -> Result<u32>;
}

/// Default backend shelling out to the `git` CLI. No timeouts: a hung child
/// process hangs the batch task that owns it.
#[derive(Debug, Default)]
pub struct ShellGit;

impl ShellGit {
    pub fn new() -> Self {
        Self
    }

    /// Runs `git` in `dir`, returning (success, raw stdout, trimmed stderr).
    async fn run(dir: &Path, args: &[&str]) -> Result<(bool, String, String)> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .map_err(|error| Error::Git(format!("git {}: {error}", args.join(" "))))?;
        Ok((
            output.status.success(),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

#[async_trait]
impl GitBackend for ShellGit {
    async fn repo_root(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if !dir.is_dir() {
            return Ok(None);
        }
        let (ok, out, _) = Self::run(dir, &["rev-parse", "--show-toplevel"]).await?;
        Ok(ok.then(|| PathBuf::from(out.trim())))
    }

    async fn status(&self, dir: &Path) -> Result<GitStatus> {
        let (ok, prefix, err) = Self::run(dir, &["rev-parse", "--show-prefix"]).await?;
        if !ok {
            return Err(Error::Git(err));
        }
        let prefix = prefix.trim().to_string();
        let (ok, out, err) = Self::run(dir, &["status", "--porcelain", "."]).await?;
        if !ok {
            return Err(Error::Git(err));
        }
        let mut files = Vec::new();
        for line in out.lines() {
            if line.len() < 4 {
                continue;
            }
            let mut chars = line.chars();
            let (Some(index), Some(working_dir)) = (chars.next(), chars.next()) else {
                continue;
            };
            // Porcelain paths are repository-root relative; make them
            // relative to `dir` via the probed prefix.
            let mut path = line[3..].to_string();
            if !prefix.is_empty() {
                if let Some(stripped) = path.strip_prefix(&prefix) {
                    path = stripped.to_string();
                }
            }
            files.push(GitStatusFile {
                index,
                working_dir,
                path,
            });
        }
        Ok(GitStatus { files })
    }

    async fn add_all(&self, dir: &Path) -> Result<()> {
        let (ok, _, err) = Self::run(dir, &["add", "."]).await?;
        if ok {
            Ok(())
        } else {
            Err(Error::Git(err))
        }
    }

    async fn add(&self, dir: &Path, files: &[String]) -> Result<()> {
        let mut args = vec!["add"];
        args.extend(files.iter().map(String::as_str));
        let (ok, _, err) = Self::run(dir, &args).await?;
        if ok {
            Ok(())
        } else {
            Err(Error::Git(err))
        }
    }

    async fn commit(&self, dir: &Path, message: &str) -> Result<bool> {
        let (ok, out, err) = Self::run(dir, &["commit", "-m", message]).await?;
        if ok {
            return Ok(true);
        }
        if out.contains("nothing to commit") || err.contains("nothing to commit") {
            return Ok(false);
        }
        Err(Error::Git(if err.is_empty() { out } else { err }))
    }

    async fn push(&self, dir: &Path, remote: Option<&str>, branch: Option<&str>) -> Result<()> {
        let mut args = vec!["push"];
        match (remote, branch) {
            (Some(remote), Some(branch)) => {
                args.push(remote);
                args.push(branch);
            }
            (Some(remote), None) => args.push(remote),
            (None, Some(branch)) => {
                args.push("origin");
                args.push(branch);
            }
            (None, None) => {}
        }
        let (ok, _, err) = Self::run(dir, &args).await?;
        if ok {
            Ok(())
        } else {
            Err(Error::Git(err))
        }
    }

    async fn fetch(&self, dir: &Path) -> Result<()> {
        let (ok, _, err) = Self::run(dir, &["fetch"]).await?;
        if ok {
            Ok(())
        } else {
            Err(Error::Git(err))
        }
    }

    async fn pull(&self, dir: &Path) -> Result<()> {
        let (ok, _, err) = Self::run(dir, &["pull"]).await?;
        if ok {
            Ok(())
        } else {
            Err(Error::Git(err))
        }
    }

    async fn ahead_count(&self, dir: &Path) -> Result<u32> {
        let (ok, out, err) = Self::run(dir, &["rev-list", "--count", "@{u}..HEAD"]).await?;
        if !ok {
            return Err(Error::Git(err));
        }
        out.trim()
            .parse::<u32>()
            .map_err(|_| Error::Git(format!("unexpected rev-list output: {}", out.trim())))
    }
}

/// One batch target.
#[derive(Debug, Clone)]
pub struct BatchMember {
    /// Workspace path (`""` = root).
    pub path: String,
    /// Absolute directory.
    pub dir: PathBuf,
    pub is_aggregator: bool,
}

impl BatchMember {
    /// Path as shown to the user.
    pub fn display(&self) -> &str {
        if self.path.is_empty() {
            "/"
        } else {
            &self.path
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Keep a target that coincides with an aggregator's own repository
    /// root. Off by default to avoid counting one physical repository via
    /// both its root and a nested package.
    pub include_root: bool,
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            include_root: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// A per-workspace batch action: `(member, backend) -> succeeded`.
pub type BatchAction = Arc<
    dyn Fn(BatchMember, Arc<dyn GitBackend>) -> BoxFuture<'static, Result<bool>> + Send + Sync,
>;

/// Groups members by enclosing repository root. Rebuilt per invocation;
/// paths outside any repository are dropped silently.
pub async fn group_members(
    members: Vec<BatchMember>,
    backend: &dyn GitBackend,
    include_root: bool,
) -> Result<Vec<(PathBuf, Vec<BatchMember>)>> {
    let mut groups: BTreeMap<PathBuf, Vec<BatchMember>> = BTreeMap::new();
    for member in members {
        let Some(root) = backend.repo_root(&member.dir).await? else {
            debug!(path = member.path, "outside any repository, dropped");
            continue;
        };
        if member.is_aggregator && root == member.dir && !include_root {
            debug!(path = member.path, "aggregator at its repository root, skipped");
            continue;
        }
        groups.entry(root).or_default().push(member);
    }
    Ok(groups.into_iter().collect())
}

/// Runs `action` over the grouped members under `policy`, returning the
/// total success count. Partial failure never aborts the batch.
pub async fn run_batch(
    members: Vec<BatchMember>,
    backend: Arc<dyn GitBackend>,
    action: BatchAction,
    policy: BatchPolicy,
    options: &BatchOptions,
) -> Result<usize> {
    let groups = group_members(members, backend.as_ref(), options.include_root).await?;
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut tasks: JoinSet<usize> = JoinSet::new();

    for (root, group) in groups {
        debug!(root = %root.display(), members = group.len(), "repository group");
        match policy {
            BatchPolicy::Parallel => {
                for member in group {
                    spawn_run(&mut tasks, &semaphore, &backend, &action, vec![member]);
                }
            }
            BatchPolicy::Sequential => {
                spawn_run(&mut tasks, &semaphore, &backend, &action, group);
            }
            BatchPolicy::Single => {
                if let Some(first) = group.into_iter().next() {
                    spawn_run(&mut tasks, &semaphore, &backend, &action, vec![first]);
                }
            }
        }
    }

    let mut succeeded = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(count) => succeeded += count,
            Err(error) => warn!(%error, "batch task panicked"),
        }
    }
    Ok(succeeded)
}

fn spawn_run(
    tasks: &mut JoinSet<usize>,
    semaphore: &Arc<Semaphore>,
    backend: &Arc<dyn GitBackend>,
    action: &BatchAction,
    members: Vec<BatchMember>,
) {
    let semaphore = Arc::clone(semaphore);
    let backend = Arc::clone(backend);
    let action = Arc::clone(action);
    tasks.spawn(async move {
        let Ok(_permit) = semaphore.acquire_owned().await else {
            return 0;
        };
        let mut count = 0;
        for member in members {
            // The action boundary: a throwing action is reported with the
            // offending path, counted as a failure and contained here.
            match action(member.clone(), Arc::clone(&backend)).await {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(error) => println!("{} {error}", member.display().red()),
            }
        }
        count
    });
}
