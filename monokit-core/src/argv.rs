//! Per-command option schemas and parsed argument records.
//!
//! Commands declare their flags at registration time, so the schemas are
//! compiled into clap commands through the builder API rather than derive.

use std::collections::BTreeMap;

use clap::{Arg, ArgAction};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct OptSpec {
    name: String,
    short: Option<char>,
    takes_value: bool,
    default: Option<String>,
}

/// Declarative option schema: long names, single-char aliases, defaults and
/// boolean coercion, plus the `manual` capability flag.
#[derive(Debug, Clone, Default)]
pub struct OptionSchema {
    specs: Vec<OptSpec>,
    /// Manual commands skip default target pre-resolution.
    pub manual: bool,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// A boolean flag, false unless present.
    pub fn flag(mut self, name: &str, short: Option<char>) -> Self {
        self.specs.push(OptSpec {
            name: name.to_string(),
            short,
            takes_value: false,
            default: None,
        });
        self
    }

    /// A string-valued option with an optional default.
    pub fn option(mut self, name: &str, short: Option<char>, default: Option<&str>) -> Self {
        self.specs.push(OptSpec {
            name: name.to_string(),
            short,
            takes_value: true,
            default: default.map(String::from),
        });
        self
    }

    pub fn manual(mut self) -> Self {
        self.manual = true;
        self
    }

    /// One-line usage summary for the banner and usage errors.
    pub fn describe(&self, name: &str) -> String {
        let mut out = format!("{name} [patterns...]");
        for spec in &self.specs {
            if spec.takes_value {
                out.push_str(&format!(" [--{} <value>]", spec.name));
            } else {
                out.push_str(&format!(" [--{}]", spec.name));
            }
        }
        if self.manual {
            out.push_str("  (manual targets)");
        }
        out
    }

    /// Parses argv for `command`. Everything after a literal `--` bypasses
    /// the parser and lands in [`Arguments::rest`].
    pub fn parse(&self, command: &str, args: &[String]) -> Result<Arguments> {
        let split = args.iter().position(|a| a == "--");
        let (head, rest) = match split {
            Some(i) => (&args[..i], args[i + 1..].to_vec()),
            None => (args, Vec::new()),
        };

        let mut cmd = clap::Command::new(command.to_string())
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .arg(
                Arg::new("patterns")
                    .num_args(0..)
                    .action(ArgAction::Append),
            );
        for spec in &self.specs {
            let mut arg = Arg::new(spec.name.clone()).long(spec.name.clone());
            if let Some(short) = spec.short {
                arg = arg.short(short);
            }
            arg = if spec.takes_value {
                arg.action(ArgAction::Set)
            } else {
                arg.action(ArgAction::SetTrue)
            };
            if let Some(default) = &spec.default {
                arg = arg.default_value(default.clone());
            }
            cmd = cmd.arg(arg);
        }

        let matches = cmd
            .try_get_matches_from(head)
            .map_err(|error| Error::Usage(error.to_string()))?;

        let positional = matches
            .get_many::<String>("patterns")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let mut flags = BTreeMap::new();
        for spec in &self.specs {
            if spec.takes_value {
                if let Some(value) = matches.get_one::<String>(&spec.name) {
                    flags.insert(spec.name.clone(), Value::String(value.clone()));
                }
            } else {
                flags.insert(spec.name.clone(), Value::Bool(matches.get_flag(&spec.name)));
            }
        }

        Ok(Arguments {
            positional,
            rest,
            flags,
            manual: self.manual,
        })
    }
}

/// One invocation's parsed arguments.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    /// Positional patterns, in order.
    pub positional: Vec<String>,
    /// Raw args after a literal `--`.
    pub rest: Vec<String>,
    flags: BTreeMap<String, Value>,
    /// Copied from the schema for stage checks.
    pub manual: bool,
}

impl Arguments {
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.flags.get(name), Some(Value::Bool(true)))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.flags.get(name).and_then(Value::as_str)
    }

    /// Removes and returns the first positional, if any.
    pub fn shift(&mut self) -> Option<String> {
        if self.positional.is_empty() {
            None
        } else {
            Some(self.positional.remove(0))
        }
    }
}
