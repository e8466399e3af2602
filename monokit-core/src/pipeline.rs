//! Command registry and the staged execution pipeline.
//!
//! One [`Monorepo`] owns the catalog, config, scope stack, hook registry and
//! command registry, and drives every invocation through
//! load -> resolve -> gate -> run. The struct is threaded mutably through
//! hooks and handlers; callback lists are `Arc`-cloned before iteration so
//! callees get exclusive access to the state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use owo_colors::OwoColorize;
use regex::Regex;
use tracing::{debug, warn};

use crate::agent::{PackageAgent, ShellAgent};
use crate::argv::{Arguments, OptionSchema};
use crate::catalog::Catalog;
use crate::config::{Config, Scope, ScopeStack};
use crate::error::{Error, Result};
use crate::gitbatch::{GitBackend, ShellGit};
use crate::hooks::{Gate, Handler, HookRegistry};
use crate::locate::{self, LocateOptions};
use crate::upgrade::{HttpRegistry, MetadataFetcher};

/// A registered command: handler plus its option schema.
#[derive(Clone)]
pub struct CommandEntry {
    pub handler: Handler,
    pub schema: OptionSchema,
}

/// Lazily installs a built-in command into the registry.
pub type Loader = fn(&mut Monorepo);

/// The monorepo orchestrator.
pub struct Monorepo {
    pub cwd: PathBuf,
    pub config: Config,
    /// Rebuilt at the start of every (sub-)invocation; immutable while
    /// targets are being resolved.
    pub catalog: Catalog,
    /// The currently executing command name.
    pub command: String,
    pub argv: Arguments,
    /// Ordered workspace paths the current command acts on. Replaced
    /// wholesale by each resolution pass.
    pub targets: Vec<String>,
    pub scopes: ScopeStack,
    pub hooks: HookRegistry,
    commands: BTreeMap<String, CommandEntry>,
    loaders: BTreeMap<String, Loader>,
    pub git: Arc<dyn GitBackend>,
    pub agent: Arc<dyn PackageAgent>,
    pub registry: Arc<dyn MetadataFetcher>,
    /// Exit code of the last external process a command chose to propagate.
    pub exit_code: i32,
}

impl Monorepo {
    pub fn new(cwd: impl Into<PathBuf>, config: Config) -> Self {
        let cwd = cwd.into();
        let git: Arc<dyn GitBackend> = Arc::new(ShellGit::new());
        let agent: Arc<dyn PackageAgent> = Arc::new(ShellAgent::detect(&cwd));
        let registry: Arc<dyn MetadataFetcher> =
            Arc::new(HttpRegistry::new(&config.upgrade.registry));
        Self::with_collaborators(cwd, config, git, agent, registry)
    }

    /// Wire-up with explicit collaborators (tests inject fakes here).
    pub fn with_collaborators(
        cwd: impl Into<PathBuf>,
        config: Config,
        git: Arc<dyn GitBackend>,
        agent: Arc<dyn PackageAgent>,
        registry: Arc<dyn MetadataFetcher>,
    ) -> Self {
        let cwd = cwd.into();
        let mut mono = Self {
            catalog: Catalog::empty(&cwd, "  "),
            cwd,
            config,
            command: String::new(),
            argv: Arguments::default(),
            targets: Vec::new(),
            scopes: ScopeStack::default(),
            hooks: HookRegistry::default(),
            commands: BTreeMap::new(),
            loaders: BTreeMap::new(),
            git,
            agent,
            registry,
            exit_code: 0,
        };

        // Built-in hooks, in a fixed registration order.
        mono.hooks.add_targets(Arc::new(rewrite_patterns_hook));
        mono.hooks.add_prepare(Arc::new(exclude_patterns_hook));
        mono.hooks.add_before(Arc::new(report_targets_hook));
        mono.hooks.add_trigger(Arc::new(resolve_trigger_hook));

        if mono.config.hooks {
            mono.hooks.add_before_execute(Arc::new(script_before_observer));
            mono.hooks.add_after_execute(Arc::new(script_after_observer));
        }

        let pipelines: Vec<String> = mono.config.pipeline.keys().cloned().collect();
        for name in pipelines {
            mono.register(&name, OptionSchema::new().manual(), Arc::new(pipeline_handler));
        }

        mono
    }

    pub fn register(&mut self, name: &str, schema: OptionSchema, handler: Handler) {
        self.commands
            .insert(name.to_string(), CommandEntry { handler, schema });
    }

    pub fn register_loader(&mut self, name: &str, loader: Loader) {
        self.loaders.insert(name.to_string(), loader);
    }

    pub fn entry(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(name)
    }

    /// Registered plus lazily loadable command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        for name in self.loaders.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        names
    }

    pub fn propagate_exit(&mut self, code: i32) {
        self.exit_code = code;
    }

    /// Resolves patterns under the current scope chain. The chain is merged
    /// anew on every call; the active layers change between invocations.
    pub fn locate(&self, patterns: &[String], options: &LocateOptions) -> Result<Vec<String>> {
        let scope = self.scopes.resolve(&self.config);
        locate::resolve(&self.catalog, &scope, patterns, options)
    }

    /// Runs one command through the full stage sequence.
    ///
    /// Boxed so handlers can re-enter it for pipeline sub-invocations and
    /// synthetic commands.
    pub fn execute<'a>(&'a mut self, name: &'a str, args: &'a [String]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            debug!(command = name, ?args, "execute");
            if !self.commands.contains_key(name) {
                if let Some(loader) = self.loaders.get(name).copied() {
                    loader(self);
                }
            }
            let Some(entry) = self.commands.get(name) else {
                return Err(Error::UnknownCommand(name.to_string()));
            };
            let schema = entry.schema.clone();
            let handler = entry.handler.clone();

            self.argv = schema.parse(name, args)?;
            let previous = std::mem::replace(&mut self.command, name.to_string());

            // Each (sub-)invocation is one run over a freshly built catalog.
            self.catalog = Catalog::scan(&self.cwd).await?;

            let layer = self.config.commands.get(name).map(Scope::from);
            let pushed = layer.is_some();
            if let Some(layer) = layer {
                self.scopes.push(layer);
            }

            let result = self.run_stages(name, handler).await;

            if pushed {
                self.scopes.pop();
            }
            self.command = previous;
            result
        })
    }

    async fn run_stages(&mut self, name: &str, handler: Handler) -> Result<()> {
        match self.gate(name).await? {
            Gate::Abort => {
                debug!(command = name, "aborted by gate");
                Ok(())
            }
            Gate::Replace(replacement) => self.run_handler(name, replacement).await,
            Gate::Proceed => self.run_handler(name, handler).await,
        }
    }

    /// Resolving and gating: `targets` stage, default resolution, `prepare`
    /// stage, `before` stage. Serial, first truthy short-circuits.
    pub async fn gate(&mut self, name: &str) -> Result<Gate> {
        let mut handled = false;
        for hook in self.hooks.targets.clone() {
            if hook(self, name).await? {
                handled = true;
                break;
            }
        }
        if !handled {
            self.set_default_targets()?;
        }
        for hook in self.hooks.prepare.clone() {
            hook(self, name).await?;
        }
        for hook in self.hooks.before.clone() {
            let gate = hook(self, name).await?;
            if !gate.is_proceed() {
                return Ok(gate);
            }
        }
        Ok(Gate::Proceed)
    }

    /// Default resolution: no positional patterns or a manual command means
    /// the whole catalog (minus aggregators unless `--root`); otherwise the
    /// deduplicated union of the per-pattern resolutions.
    fn set_default_targets(&mut self) -> Result<()> {
        let options = LocateOptions::with_root(self.argv.flag("root"));
        let patterns = if self.argv.manual {
            Vec::new()
        } else {
            self.argv.positional.clone()
        };
        self.targets = self.locate(&patterns, &options)?;
        Ok(())
    }

    async fn run_handler(&mut self, name: &str, handler: Handler) -> Result<()> {
        let args = self.argv.positional.clone();
        let observers = self.hooks.before_execute.clone();
        self.notify(observers, name, &args).await;
        let result = handler(self).await;
        if result.is_ok() {
            let observers = self.hooks.after_execute.clone();
            self.notify(observers, name, &args).await;
        }
        result
    }

    /// Observers must not rewrite pipeline state: argv, targets and the
    /// propagated exit code are restored around them, and their errors are
    /// logged and swallowed.
    async fn notify(
        &mut self,
        observers: Vec<crate::hooks::Observer>,
        name: &str,
        args: &[String],
    ) {
        if observers.is_empty() {
            return;
        }
        let saved_argv = std::mem::take(&mut self.argv);
        let saved_targets = std::mem::take(&mut self.targets);
        let saved_exit = self.exit_code;
        for observer in observers {
            if let Err(error) = observer(self, name, args).await {
                warn!(command = name, %error, "observer failed");
            }
        }
        self.argv = saved_argv;
        self.targets = saved_targets;
        self.exit_code = saved_exit;
    }

    /// Re-enters the resolve-then-gate sequence for a synthetic sub-command.
    /// Returns whether the gate aborted.
    pub fn trigger<'a>(
        &'a mut self,
        name: &'a str,
        options: LocateOptions,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            for hook in self.hooks.trigger.clone() {
                if hook(self, name, options.clone()).await? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }
}

/// `targets` stage: applies configured rewrite rules to the positional
/// patterns. Never claims the stage, so default resolution still runs.
fn rewrite_patterns_hook<'a>(
    mono: &'a mut Monorepo,
    _name: &'a str,
) -> BoxFuture<'a, Result<bool>> {
    Box::pin(async move {
        if mono.argv.manual || mono.argv.positional.is_empty() || mono.config.rewrite.is_empty() {
            return Ok(false);
        }
        let rules = mono.config.rewrite.clone();
        let mut positional = mono.argv.positional.clone();
        for rule in &rules {
            let matcher = Regex::new(&rule.pattern).map_err(|error| Error::Pattern {
                pattern: rule.pattern.clone(),
                error,
            })?;
            for arg in positional.clone() {
                if !matcher.is_match(&arg) {
                    continue;
                }
                if !rule.preserve {
                    positional.retain(|a| a != &arg);
                }
                for pair in &rule.rules {
                    let source = Regex::new(&pair.source).map_err(|error| Error::Pattern {
                        pattern: pair.source.clone(),
                        error,
                    })?;
                    positional.push(source.replace(&arg, pair.target.as_str()).into_owned());
                }
            }
        }
        mono.argv.positional = positional;
        Ok(false)
    })
}

/// `prepare` stage: subtracts the command scope's `exclude-patterns` from
/// the resolved target set. A pattern resolving to nothing is a no-op.
fn exclude_patterns_hook<'a>(mono: &'a mut Monorepo, name: &'a str) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        if mono.argv.manual {
            return Ok(());
        }
        let patterns = match mono.config.commands.get(name) {
            Some(scope) => scope.exclude_patterns.clone(),
            None => return Ok(()),
        };
        if patterns.is_empty() {
            return Ok(());
        }
        let options = LocateOptions::with_root(mono.argv.flag("root"));
        let mut excluded = Vec::new();
        for pattern in patterns {
            match mono.locate(std::slice::from_ref(&pattern), &options) {
                Ok(mut paths) => excluded.append(&mut paths),
                Err(Error::WorkspaceNotFound(_)) => {}
                Err(error) => return Err(error),
            }
        }
        mono.targets.retain(|path| !excluded.contains(path));
        Ok(())
    })
}

/// `before` stage: reports how many workspaces the command will act on.
fn report_targets_hook<'a>(mono: &'a mut Monorepo, name: &'a str) -> BoxFuture<'a, Result<Gate>> {
    Box::pin(async move {
        if !mono.argv.manual {
            println!(
                "{} {}",
                format!("[{name}]").cyan(),
                format!("Located {} workspaces.", mono.targets.len()).green()
            );
        }
        Ok(Gate::Proceed)
    })
}

/// Default `trigger` hook: re-resolves targets with the caller's options,
/// then replays the prepare and before stages.
fn resolve_trigger_hook<'a>(
    mono: &'a mut Monorepo,
    name: &'a str,
    options: LocateOptions,
) -> BoxFuture<'a, Result<bool>> {
    Box::pin(async move {
        let patterns = mono.argv.positional.clone();
        mono.targets = mono.locate(&patterns, &options)?;
        for hook in mono.hooks.prepare.clone() {
            hook(mono, name).await?;
        }
        for hook in mono.hooks.before.clone() {
            if !hook(mono, name).await?.is_proceed() {
                return Ok(true);
            }
        }
        Ok(false)
    })
}

/// Handler behind every configured pipeline command: runs each
/// sub-invocation through the full stage sequence, one after another. A
/// `--` inside a sub-invocation splits args inserted before the inherited
/// trailing args from args appended after them.
fn pipeline_handler(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let name = mono.command.clone();
        let Some(tasks) = mono.config.pipeline.get(&name).cloned() else {
            return Err(Error::UnknownCommand(name));
        };
        let inherited = mono.argv.positional.clone();
        for task in tasks {
            let mut words: Vec<String> = task.split_whitespace().map(String::from).collect();
            if words.is_empty() {
                continue;
            }
            let sub = words.remove(0);
            let (mut args, after) = match words.iter().position(|w| w == "--") {
                Some(i) => {
                    let after = words[i + 1..].to_vec();
                    words.truncate(i);
                    (words, after)
                }
                None => (words, Vec::new()),
            };
            args.extend(inherited.iter().cloned());
            args.extend(after);
            mono.execute(&sub, &args).await?;
        }
        Ok(())
    })
}

async fn run_script_hook(mono: &mut Monorepo, name: &str, args: &[String], phase: &str) -> Result<()> {
    if name == "run" || name.starts_with("monokit:") {
        return Ok(());
    }
    let mut call: Vec<String> = args.to_vec();
    call.push("--".to_string());
    call.push(format!("monokit:{phase}:{name}"));
    mono.execute("run", &call).await
}

fn script_before_observer<'a>(
    mono: &'a mut Monorepo,
    name: &'a str,
    args: &'a [String],
) -> BoxFuture<'a, Result<()>> {
    Box::pin(run_script_hook(mono, name, args, "before"))
}

fn script_after_observer<'a>(
    mono: &'a mut Monorepo,
    name: &'a str,
    args: &'a [String],
) -> BoxFuture<'a, Result<()>> {
    Box::pin(run_script_hook(mono, name, args, "after"))
}
