//! Dependency upgrade engine.
//!
//! Scans target manifests for external semver ranges, fetches remote
//! metadata under bounded concurrency, and rewrites ranges in place while
//! preserving the operator. Persistence is left to the caller so `--dry`
//! can show the diff without touching disk.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use semver::{Version, VersionReq};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::manifest::DepGroup;

/// Remote package metadata: published versions plus dist-tags.
#[derive(Debug, Clone, Default)]
pub struct RemoteMetadata {
    pub versions: Vec<Version>,
    pub tags: BTreeMap<String, String>,
}

impl RemoteMetadata {
    /// Best version for a request: a dist-tag by name, the highest version
    /// satisfying a range, or the highest published version for `""`.
    pub fn select(&self, range: &str) -> Option<Version> {
        if range.is_empty() {
            return self.versions.iter().max().cloned();
        }
        if let Some(tagged) = self.tags.get(range) {
            return Version::parse(tagged).ok();
        }
        let req = VersionReq::parse(range).ok()?;
        self.versions.iter().filter(|v| req.matches(v)).max().cloned()
    }
}

/// Remote package-metadata fetcher.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<RemoteMetadata>;
}

/// npm-style registry client fetching abbreviated metadata documents.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: reqwest::Client,
    base: String,
}

impl HttpRegistry {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }
}

#[async_trait]
impl MetadataFetcher for HttpRegistry {
    async fn fetch(&self, name: &str) -> Result<RemoteMetadata> {
        #[derive(serde::Deserialize)]
        struct Doc {
            #[serde(default)]
            versions: serde_json::Map<String, serde_json::Value>,
            #[serde(rename = "dist-tags", default)]
            dist_tags: BTreeMap<String, String>,
        }

        let url = format!("{}/{}", self.base.trim_end_matches('/'), name);
        let response = self
            .client
            .get(&url)
            .header(
                reqwest::header::ACCEPT,
                "application/vnd.npm.install-v1+json",
            )
            .send()
            .await
            .map_err(|error| Error::Registry(format!("{name}: {error}")))?;
        if !response.status().is_success() {
            return Err(Error::Registry(format!("{name}: {}", response.status())));
        }
        let doc: Doc = response
            .json()
            .await
            .map_err(|error| Error::Registry(format!("{name}: {error}")))?;

        let mut versions: Vec<Version> = doc
            .versions
            .keys()
            .filter_map(|v| Version::parse(v).ok())
            .collect();
        versions.sort();
        Ok(RemoteMetadata {
            versions,
            tags: doc.dist_tags,
        })
    }
}

/// Unwraps an `npm:alias@range` value into its real package name and range.
fn split_alias<'a>(dep: &'a str, value: &'a str) -> (&'a str, &'a str) {
    if let Some(rest) = value.strip_prefix("npm:") {
        if let Some(at) = rest.rfind('@') {
            if at > 0 {
                return (&rest[..at], &rest[at + 1..]);
            }
        }
    }
    (dep, value)
}

#[derive(Debug, Default)]
pub struct UpgradeOutcome {
    /// Sorted, user-facing diff lines.
    pub lines: Vec<String>,
}

pub struct UpgradeEngine {
    concurrency: usize,
    next: bool,
}

impl UpgradeEngine {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            next: false,
        }
    }

    /// Lifts the dist-tag ceiling to the highest published version.
    pub fn with_next(mut self, next: bool) -> Self {
        self.next = next;
        self
    }

    /// Upgrades the dependency ranges of the manifests at `paths`, marking
    /// rewritten manifests dirty in the catalog.
    pub async fn run(
        &self,
        catalog: &mut Catalog,
        paths: &[String],
        fetcher: Arc<dyn MetadataFetcher>,
    ) -> Result<UpgradeOutcome> {
        // Dependencies named after a located workspace are links into the
        // monorepo itself and are never rewritten.
        let workspace_names: HashSet<String> = paths
            .iter()
            .filter_map(|path| catalog.get(path))
            .map(|manifest| manifest.name().to_string())
            .collect();

        let mut sites: BTreeMap<(String, String), Vec<(String, DepGroup, String)>> =
            BTreeMap::new();
        for path in paths {
            let Some(manifest) = catalog.get(path) else {
                continue;
            };
            for group in DepGroup::ALL {
                for (dep, value) in manifest.deps(group) {
                    let (fetch_name, range) = split_alias(dep, value);
                    if workspace_names.contains(fetch_name) {
                        continue;
                    }
                    if !range.starts_with(['^', '~']) {
                        continue;
                    }
                    sites
                        .entry((fetch_name.to_string(), range.to_string()))
                        .or_default()
                        .push((path.clone(), group, dep.to_string()));
                }
            }
        }

        let requests: BTreeSet<String> = sites.keys().map(|(name, _)| name.clone()).collect();
        let progress = ProgressBar::new(requests.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("Progress bar template is valid"),
        );
        progress.set_message("fetching registry metadata");

        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut fetches: JoinSet<(String, Result<RemoteMetadata>)> = JoinSet::new();
        for name in requests {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&fetcher);
            let progress = progress.clone();
            fetches.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (name, Err(Error::Registry("pool closed".to_string())));
                };
                let result = fetcher.fetch(&name).await;
                progress.inc(1);
                (name, result)
            });
        }

        let mut remotes: BTreeMap<String, RemoteMetadata> = BTreeMap::new();
        while let Some(joined) = fetches.join_next().await {
            let Ok((name, result)) = joined else {
                continue;
            };
            match result {
                Ok(remote) => {
                    remotes.insert(name, remote);
                }
                // A failed fetch is reported and skipped, never fatal.
                Err(error) => progress.println(format!("- {}: failed to fetch ({error})", name.red())),
            }
        }
        progress.finish_and_clear();

        let mut lines = Vec::new();
        for ((name, range), usages) in sites {
            let Some(remote) = remotes.get(&name) else {
                continue;
            };
            let Some(new_version) = remote.select(&range) else {
                continue;
            };
            let ceiling = remote.select(if self.next { "" } else { "latest" });
            let old = match Version::parse(&range[1..]) {
                Ok(version) => version,
                Err(_) => {
                    lines.push(format!("- {}: skipped", name.red()));
                    continue;
                }
            };
            if new_version <= old {
                continue;
            }
            let new_range = format!("{}{}", &range[..1], new_version);
            let suffix = match &ceiling {
                Some(latest) if *latest != new_version => format!(" (latest: {latest})"),
                _ => String::new(),
            };
            lines.push(format!(
                "- {}: {} -> {}{}",
                name.yellow(),
                old.to_string().cyan(),
                new_version.to_string().green(),
                suffix
            ));
            for (path, group, dep) in usages {
                if let Some(manifest) = catalog.get_mut(&path) {
                    manifest.rewrite_dep(group, &dep, &range, &new_range);
                    catalog.mark_dirty(&path);
                }
            }
        }
        lines.sort();
        Ok(UpgradeOutcome { lines })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(versions: &[&str], latest: Option<&str>) -> RemoteMetadata {
        let mut tags = BTreeMap::new();
        if let Some(latest) = latest {
            tags.insert("latest".to_string(), latest.to_string());
        }
        RemoteMetadata {
            versions: versions
                .iter()
                .map(|v| Version::parse(v).unwrap())
                .collect(),
            tags,
        }
    }

    #[test]
    fn select_prefers_tag_then_range_then_max() {
        let remote = meta(&["1.0.0", "1.2.0", "2.0.0"], Some("1.2.0"));
        assert_eq!(remote.select("latest"), Version::parse("1.2.0").ok());
        assert_eq!(remote.select("^1.0.0"), Version::parse("1.2.0").ok());
        assert_eq!(remote.select(""), Version::parse("2.0.0").ok());
        assert_eq!(remote.select("^3.0.0"), None);
    }

    #[test]
    fn tilde_range_stays_in_patch_series() {
        let remote = meta(&["1.0.0", "1.0.9", "1.1.0"], None);
        assert_eq!(remote.select("~1.0.0"), Version::parse("1.0.9").ok());
    }

    #[test]
    fn alias_values_unwrap_to_real_names() {
        assert_eq!(split_alias("pad", "npm:left-pad@^1.0.0"), ("left-pad", "^1.0.0"));
        assert_eq!(
            split_alias("ui", "npm:@acme/ui-kit@~2.0.0"),
            ("@acme/ui-kit", "~2.0.0")
        );
        assert_eq!(split_alias("plain", "^1.0.0"), ("plain", "^1.0.0"));
    }
}
