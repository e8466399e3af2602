//! Target resolution: pattern matching over the workspace catalog.

use std::sync::Arc;

use regex::Regex;

use crate::catalog::Catalog;
use crate::config::Scope;
use crate::error::{Error, Result};
use crate::manifest::Manifest;

/// Predicate ANDed with every other matching criterion.
pub type LocateFilter = Arc<dyn Fn(&Manifest, &str) -> bool + Send + Sync>;

/// Knobs of one resolution pass.
#[derive(Clone)]
pub struct LocateOptions {
    /// Include aggregators (manifests declaring nested workspaces).
    pub root: bool,
    /// Match against workspace paths.
    pub folder: bool,
    /// Match against declared package names.
    pub package: bool,
    pub filter: Option<LocateFilter>,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            root: false,
            folder: true,
            package: true,
            filter: None,
        }
    }
}

impl LocateOptions {
    pub fn with_root(root: bool) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Compiles an anchored workspace glob: `*` is one-or-more non-separator
/// characters, `?` exactly one; everything else is literal.
fn compile(pattern: &str) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str("[^/]+"),
            '?' => source.push_str("[^/]"),
            _ => source.push_str(&regex::escape(&ch.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|error| Error::Pattern {
        pattern: pattern.to_string(),
        error,
    })
}

fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

struct Matcher<'a> {
    catalog: &'a Catalog,
    options: &'a LocateOptions,
    excludes: Vec<Regex>,
}

impl<'a> Matcher<'a> {
    fn new(catalog: &'a Catalog, scope: &Scope, options: &'a LocateOptions) -> Result<Self> {
        let excludes = scope
            .exclude
            .iter()
            .map(|pattern| compile(pattern.trim_start_matches('/')))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            catalog,
            options,
            excludes,
        })
    }

    /// Criteria every returned workspace must pass, regardless of pattern.
    fn admit(&self, path: &str, manifest: &Manifest) -> bool {
        if !self.options.root && manifest.is_aggregator() {
            return false;
        }
        if let Some(filter) = &self.options.filter {
            if !filter(manifest, path) {
                return false;
            }
        }
        let rel = path.strip_prefix('/').unwrap_or(path);
        !self.excludes.iter().any(|re| re.is_match(rel))
    }

    fn all(&self) -> Vec<String> {
        self.catalog
            .iter()
            .filter(|(path, manifest)| self.admit(path, manifest))
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn folder_hit(&self, path: &str, pattern: &str, glob: Option<&Regex>) -> bool {
        match glob {
            Some(re) => {
                let rel = path.strip_prefix('/').unwrap_or(path);
                re.is_match(path) || re.is_match(rel)
            }
            None => path == pattern || path.ends_with(&format!("/{pattern}")),
        }
    }

    fn package_hit(&self, manifest: &Manifest, pattern: &str, glob: Option<&Regex>) -> bool {
        let name = manifest.name();
        if let Some(rest) = pattern.strip_prefix('!') {
            return name == rest;
        }
        match glob {
            Some(re) => re.is_match(name) || re.is_match(last_segment(name)),
            None => name == pattern || last_segment(name) == pattern,
        }
    }

    fn one(&self, scope: &Scope, pattern: &str) -> Result<Vec<String>> {
        // An alias hit short-circuits every other matching rule; a target
        // the catalog does not know is a config error naming the requester.
        if let Some(paths) = scope.alias.get(pattern) {
            return paths
                .iter()
                .map(|path| {
                    if self.catalog.contains(path) {
                        Ok(path.clone())
                    } else {
                        Err(Error::AliasTarget {
                            alias: pattern.to_string(),
                            path: path.clone(),
                        })
                    }
                })
                .collect();
        }

        let glob = if is_glob(pattern) {
            Some(compile(pattern)?)
        } else {
            None
        };

        let mut found = Vec::new();
        for (path, manifest) in self.catalog.iter() {
            if !self.admit(path, manifest) {
                continue;
            }
            let hit = (self.options.folder && self.folder_hit(path, pattern, glob.as_ref()))
                || (self.options.package && self.package_hit(manifest, pattern, glob.as_ref()));
            if hit {
                found.push(path.clone());
            }
        }

        // A glob legitimately matches nothing; a literal must name exactly
        // one workspace.
        if glob.is_some() {
            return Ok(found);
        }
        match found.len() {
            0 => Err(Error::WorkspaceNotFound(pattern.to_string())),
            1 => Ok(found),
            _ => Err(Error::AmbiguousWorkspace {
                pattern: pattern.to_string(),
                candidates: found.join(", "),
            }),
        }
    }
}

/// Resolves `patterns` against the catalog under the given scope.
///
/// Patterns are resolved independently, concatenated and deduplicated
/// preserving first-seen order. An empty pattern list matches everything
/// that passes the admission criteria, in catalog (path) order.
pub fn resolve(
    catalog: &Catalog,
    scope: &Scope,
    patterns: &[String],
    options: &LocateOptions,
) -> Result<Vec<String>> {
    let matcher = Matcher::new(catalog, scope, options)?;
    if patterns.is_empty() {
        return Ok(matcher.all());
    }
    let mut out = Vec::new();
    for pattern in patterns {
        for path in matcher.one(scope, pattern)? {
            if !out.contains(&path) {
                out.push(path);
            }
        }
    }
    Ok(out)
}
