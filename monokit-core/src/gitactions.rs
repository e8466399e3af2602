//! Built-in git batch actions.
//!
//! Every action conforms to `(member, backend) -> succeeded` and carries its
//! own group dispatch policy: read-only status fans out, index-mutating
//! operations run one member at a time, whole-repository operations run once
//! per physical repository.

use std::sync::Arc;

use owo_colors::OwoColorize;

use crate::error::Result;
use crate::gitbatch::{BatchAction, BatchMember, BatchPolicy, GitBackend};
use crate::manifest::MANIFEST_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOp {
    Status,
    Add,
    Commit,
    Push,
    Fetch,
    Pull,
    /// Add, commit and push; succeeds only when nothing is left unpushed.
    Acp,
    /// Stage modified manifests only and commit them as a version bump.
    Chore,
}

pub const SUBCOMMANDS: [(&str, GitOp, BatchPolicy); 8] = [
    ("status", GitOp::Status, BatchPolicy::Parallel),
    ("add", GitOp::Add, BatchPolicy::Sequential),
    ("commit", GitOp::Commit, BatchPolicy::Sequential),
    ("push", GitOp::Push, BatchPolicy::Single),
    ("fetch", GitOp::Fetch, BatchPolicy::Single),
    ("pull", GitOp::Pull, BatchPolicy::Single),
    ("acp", GitOp::Acp, BatchPolicy::Sequential),
    ("chore", GitOp::Chore, BatchPolicy::Sequential),
];

pub fn lookup(name: &str) -> Option<(GitOp, BatchPolicy)> {
    SUBCOMMANDS
        .iter()
        .find(|(sub, _, _)| *sub == name)
        .map(|(_, op, policy)| (*op, *policy))
}

pub fn subcommand_names() -> Vec<&'static str> {
    SUBCOMMANDS.iter().map(|(sub, _, _)| *sub).collect()
}

/// Flag state shared by every action of one batch.
#[derive(Debug, Clone, Default)]
pub struct GitActionContext {
    pub message: String,
    pub remote: Option<String>,
    pub branch: Option<String>,
    /// Status codes to keep when filtering `status` output.
    pub working_dirs: Option<String>,
    /// Suppress mutations, print the planned operation instead.
    pub dry: bool,
}

pub fn make_action(op: GitOp, ctx: Arc<GitActionContext>) -> BatchAction {
    Arc::new(move |member, backend| {
        let ctx = Arc::clone(&ctx);
        Box::pin(run_action(op, ctx, member, backend))
    })
}

async fn run_action(
    op: GitOp,
    ctx: Arc<GitActionContext>,
    member: BatchMember,
    backend: Arc<dyn GitBackend>,
) -> Result<bool> {
    match op {
        GitOp::Status => {
            let status = backend.status(&member.dir).await?;
            let files: Vec<String> = status
                .files
                .iter()
                .filter(|f| {
                    ctx.working_dirs
                        .as_ref()
                        .map_or(true, |dirs| dirs.contains(f.working_dir))
                })
                .map(|f| format!("{} {}", f.working_dir.yellow(), f.path))
                .collect();
            if !files.is_empty() {
                println!("{}", member.display().cyan());
                println!("{}", files.join("\n"));
            }
            Ok(true)
        }
        GitOp::Add => {
            if ctx.dry {
                println!("{} would stage all changes", member.display().cyan());
                return Ok(true);
            }
            backend.add_all(&member.dir).await?;
            Ok(true)
        }
        GitOp::Commit => {
            if ctx.dry {
                println!(
                    "{} would commit with message {:?}",
                    member.display().cyan(),
                    ctx.message
                );
                return Ok(true);
            }
            backend.add_all(&member.dir).await?;
            backend.commit(&member.dir, &ctx.message).await
        }
        GitOp::Push => {
            if ctx.dry {
                println!("{} would push", member.display().cyan());
                return Ok(true);
            }
            // Only a clean tree is pushed; pending changes mean the commit
            // step was skipped on purpose.
            let status = backend.status(&member.dir).await?;
            if status.is_clean() {
                backend
                    .push(&member.dir, ctx.remote.as_deref(), ctx.branch.as_deref())
                    .await?;
            }
            Ok(true)
        }
        GitOp::Fetch => {
            if ctx.dry {
                println!("{} would fetch", member.display().cyan());
                return Ok(true);
            }
            backend.fetch(&member.dir).await?;
            Ok(true)
        }
        GitOp::Pull => {
            if ctx.dry {
                println!("{} would pull", member.display().cyan());
                return Ok(true);
            }
            backend.pull(&member.dir).await?;
            Ok(true)
        }
        GitOp::Acp => {
            if ctx.dry {
                println!("{} would add, commit and push", member.display().cyan());
                return Ok(true);
            }
            backend.add_all(&member.dir).await?;
            backend.commit(&member.dir, &ctx.message).await?;
            backend
                .push(&member.dir, ctx.remote.as_deref(), ctx.branch.as_deref())
                .await?;
            Ok(backend.ahead_count(&member.dir).await? == 0)
        }
        GitOp::Chore => {
            let status = backend.status(&member.dir).await?;
            let files: Vec<String> = status
                .files
                .iter()
                .filter(|f| {
                    matches!(f.working_dir, 'M' | ' ')
                        && f.path.rsplit('/').next() == Some(MANIFEST_FILE)
                })
                .map(|f| f.path.clone())
                .collect();
            if files.is_empty() {
                return Ok(false);
            }
            if ctx.dry {
                println!(
                    "{} would commit {} manifest(s)",
                    member.display().cyan(),
                    files.len()
                );
                return Ok(true);
            }
            backend.add(&member.dir, &files).await?;
            let message = if ctx.message.is_empty() {
                "chore: bump versions"
            } else {
                ctx.message.as_str()
            };
            backend.commit(&member.dir, message).await
        }
    }
}
