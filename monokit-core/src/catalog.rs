//! Workspace catalog: scanning, lookup and persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::manifest::{detect_indent, Manifest, MANIFEST_FILE};

/// Mapping of workspace path to manifest, built once per pipeline run.
///
/// Paths are keyed in the `""` (root) / `"/packages/a"` convention so lookups
/// and display stay platform independent. The map is immutable while targets
/// are being resolved; the upgrade engine mutates manifests through it and
/// tracks which ones need saving.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    indent: String,
    entries: BTreeMap<String, Manifest>,
    dirty: BTreeSet<String>,
}

impl Catalog {
    pub fn empty(root: impl Into<PathBuf>, indent: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            indent: indent.into(),
            entries: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Scans the workspace tree under `cwd`.
    ///
    /// The root manifest's `workspaces` globs are expanded, the root path is
    /// always included, and every candidate directory's manifest is read
    /// concurrently. A directory without a parseable manifest is silently
    /// skipped; only a malformed root manifest is fatal.
    pub async fn scan(cwd: &Path) -> Result<Self> {
        let root_file = cwd.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&root_file)?;
        let indent = detect_indent(&text);
        let root_manifest = Manifest::parse(&text).map_err(|error| Error::Manifest {
            path: root_file.display().to_string(),
            error,
        })?;

        let mut folders: Vec<String> = Vec::new();
        for pattern in root_manifest.workspaces().unwrap_or_default() {
            let full = cwd.join(pattern);
            let expanded =
                glob::glob(&full.to_string_lossy()).map_err(|error| Error::WorkspaceGlob {
                    pattern: pattern.to_string(),
                    error,
                })?;
            for entry in expanded.flatten() {
                if !entry.is_dir() {
                    continue;
                }
                let Ok(rel) = entry.strip_prefix(cwd) else {
                    continue;
                };
                let key = format!("/{}", rel.to_string_lossy().replace('\\', "/"));
                if !folders.contains(&key) {
                    folders.push(key);
                }
            }
        }

        let mut catalog = Self::empty(cwd, indent);
        catalog.insert(String::new(), root_manifest);

        // Manifest reads run concurrently with no ordering guarantee; the
        // catalog is assembled only after every read has finished.
        let mut reads = JoinSet::new();
        for folder in folders {
            let file = cwd.join(&folder[1..]).join(MANIFEST_FILE);
            reads.spawn_blocking(move || (folder, std::fs::read_to_string(file)));
        }
        while let Some(joined) = reads.join_next().await {
            let Ok((folder, read)) = joined else {
                continue;
            };
            let Ok(text) = read else {
                debug!(folder, "no manifest, skipping directory");
                continue;
            };
            match Manifest::parse(&text) {
                Ok(manifest) => catalog.insert(folder, manifest),
                Err(error) => debug!(folder, %error, "unparseable manifest, skipping"),
            }
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, path: String, manifest: Manifest) {
        self.entries.insert(path, manifest);
    }

    pub fn get(&self, path: &str) -> Option<&Manifest> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Manifest> {
        self.entries.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Manifest)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn indent(&self) -> &str {
        &self.indent
    }

    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    /// Absolute directory of a workspace path.
    pub fn dir(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&path[1..])
        }
    }

    pub fn mark_dirty(&mut self, path: &str) {
        if self.entries.contains_key(path) {
            self.dirty.insert(path.to_string());
        }
    }

    pub fn dirty_paths(&self) -> impl Iterator<Item = &String> {
        self.dirty.iter()
    }

    /// Writes one manifest back with the run-wide indentation.
    pub fn save(&mut self, path: &str) -> Result<()> {
        let manifest = self
            .entries
            .get(path)
            .ok_or_else(|| Error::WorkspaceNotFound(path.to_string()))?;
        let text = manifest.to_string_with_indent(&self.indent)?;
        std::fs::write(self.dir(path).join(MANIFEST_FILE), text)?;
        self.dirty.remove(path);
        Ok(())
    }

    /// Saves every manifest marked dirty, returning how many were written.
    /// Saves are not transactional: an error leaves earlier writes in place.
    pub fn save_dirty(&mut self) -> Result<usize> {
        let paths: Vec<String> = self.dirty.iter().cloned().collect();
        for path in &paths {
            self.save(path)?;
        }
        Ok(paths.len())
    }
}
