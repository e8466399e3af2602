//! Tool configuration (`monokit.toml`) and cascading scope layers.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// File name of the tool configuration at the workspace root.
pub const CONFIG_FILE: &str = "monokit.toml";

/// One or many alias targets, so `core = "/packages/core"` and
/// `utils = ["/packages/utils", "/packages/helpers"]` both parse.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AliasTargets {
    One(String),
    Many(Vec<String>),
}

impl AliasTargets {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            AliasTargets::One(path) => vec![path.clone()],
            AliasTargets::Many(paths) => paths.clone(),
        }
    }
}

/// A pattern rewrite applied to positional patterns before resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteRule {
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(default)]
    pub rules: Vec<RewritePair>,
    #[serde(default = "default_true")]
    pub preserve: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewritePair {
    pub source: String,
    pub target: String,
}

fn default_true() -> bool {
    true
}

/// Per-command scope: alias/exclude overrides plus resolver exclusions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandScope {
    pub alias: BTreeMap<String, AliasTargets>,
    pub exclude: Vec<String>,
    #[serde(rename = "exclude-patterns")]
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    pub concurrency: usize,
    pub registry: String,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            registry: "https://registry.npmjs.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub alias: BTreeMap<String, AliasTargets>,
    pub exclude: Vec<String>,
    pub rewrite: Vec<RewriteRule>,
    pub pipeline: BTreeMap<String, Vec<String>>,
    pub commands: BTreeMap<String, CommandScope>,
    pub hooks: bool,
    pub upgrade: UpgradeConfig,
}

impl Config {
    /// Loads `monokit.toml` from `cwd`; a missing file yields the defaults.
    pub fn load(cwd: &Path) -> Result<Self> {
        let file = cwd.join(CONFIG_FILE);
        if !file.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&file)?;
        toml::from_str(&text).map_err(|error| Error::Config {
            path: file.display().to_string(),
            error: Box::new(error),
        })
    }
}

/// Flattened alias/exclude settings the resolver consumes.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub alias: BTreeMap<String, Vec<String>>,
    pub exclude: Vec<String>,
}

impl From<&CommandScope> for Scope {
    fn from(scope: &CommandScope) -> Self {
        Self {
            alias: scope
                .alias
                .iter()
                .map(|(name, targets)| (name.clone(), targets.to_vec()))
                .collect(),
            exclude: scope.exclude.clone(),
        }
    }
}

/// Explicit stack of scope layers, outermost first.
///
/// `resolve` merges the base config with every layer: maps are merged with
/// the inner layer winning key collisions, arrays are unioned. The merge is
/// recomputed on every resolution call, never cached, because the active
/// layers change between invocations.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    layers: Vec<Scope>,
}

impl ScopeStack {
    pub fn push(&mut self, scope: Scope) {
        self.layers.push(scope);
    }

    pub fn pop(&mut self) {
        self.layers.pop();
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn resolve(&self, base: &Config) -> Scope {
        let mut merged = Scope {
            alias: base
                .alias
                .iter()
                .map(|(name, targets)| (name.clone(), targets.to_vec()))
                .collect(),
            exclude: base.exclude.clone(),
        };
        for layer in &self.layers {
            for (name, paths) in &layer.alias {
                merged.alias.insert(name.clone(), paths.clone());
            }
            for pattern in &layer.exclude {
                if !merged.exclude.contains(pattern) {
                    merged.exclude.push(pattern.clone());
                }
            }
        }
        merged
    }
}
