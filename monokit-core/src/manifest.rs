//! Workspace manifest model and round-trip serialization.
//!
//! A manifest is kept as the raw ordered JSON object it was parsed from, so
//! fields this tool knows nothing about survive a load/save cycle untouched.
//! Typed accessors sit on top of the raw object; writers rewrite single
//! values in place and leave key order alone.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::error::Result;

/// File name of a workspace manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// The four dependency groups a manifest may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepGroup {
    Runtime,
    Dev,
    Peer,
    Optional,
}

impl DepGroup {
    pub const ALL: [DepGroup; 4] = [
        DepGroup::Runtime,
        DepGroup::Dev,
        DepGroup::Peer,
        DepGroup::Optional,
    ];

    /// Manifest key of the group.
    pub fn key(&self) -> &'static str {
        match self {
            DepGroup::Runtime => "dependencies",
            DepGroup::Dev => "devDependencies",
            DepGroup::Peer => "peerDependencies",
            DepGroup::Optional => "optionalDependencies",
        }
    }
}

/// A single workspace manifest (`package.json`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    raw: Map<String, Value>,
}

impl Manifest {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let raw: Map<String, Value> = serde_json::from_str(text)?;
        Ok(Self { raw })
    }

    pub fn from_object(raw: Map<String, Value>) -> Self {
        Self { raw }
    }

    /// Declared package name; empty when the manifest has none.
    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(Value::as_str).unwrap_or("")
    }

    pub fn version(&self) -> Option<&str> {
        self.raw.get("version").and_then(Value::as_str)
    }

    /// Nested-workspace globs. Presence marks the manifest as an aggregator.
    pub fn workspaces(&self) -> Option<Vec<&str>> {
        let list = self.raw.get("workspaces")?.as_array()?;
        Some(list.iter().filter_map(Value::as_str).collect())
    }

    /// An aggregator declares nested workspaces and is not itself a leaf.
    pub fn is_aggregator(&self) -> bool {
        self.raw.get("workspaces").is_some()
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.raw
            .get("scripts")
            .and_then(Value::as_object)
            .is_some_and(|scripts| scripts.contains_key(name))
    }

    /// Iterates `(name, range)` pairs of one dependency group.
    pub fn deps(&self, group: DepGroup) -> impl Iterator<Item = (&str, &str)> {
        self.raw
            .get(group.key())
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|map| {
                map.iter()
                    .filter_map(|(name, value)| value.as_str().map(|range| (name.as_str(), range)))
            })
    }

    pub fn dep(&self, group: DepGroup, name: &str) -> Option<&str> {
        self.raw
            .get(group.key())?
            .as_object()?
            .get(name)?
            .as_str()
    }

    /// Replaces the trailing `old_range` of a dependency value with
    /// `new_range`, keeping any `npm:alias@` prefix in front of it.
    pub fn rewrite_dep(&mut self, group: DepGroup, name: &str, old_range: &str, new_range: &str) {
        let Some(entry) = self
            .raw
            .get_mut(group.key())
            .and_then(Value::as_object_mut)
            .and_then(|map| map.get_mut(name))
        else {
            return;
        };
        if let Some(value) = entry.as_str() {
            if let Some(prefix) = value.strip_suffix(old_range) {
                *entry = Value::String(format!("{prefix}{new_range}"));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.raw.insert(key.to_string(), value);
    }

    /// Pretty-prints the manifest with the given indentation unit and a
    /// trailing newline, preserving key order.
    pub fn to_string_with_indent(&self, indent: &str) -> Result<String> {
        let mut out = Vec::with_capacity(256);
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.raw.serialize(&mut serializer)?;
        out.push(b'\n');
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Detects the indentation unit of a manifest text: the leading whitespace
/// of the first indented non-blank line. Falls back to two spaces.
pub fn detect_indent(text: &str) -> String {
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent: String = line
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect();
        if !indent.is_empty() {
            return indent;
        }
    }
    "  ".to_string()
}
