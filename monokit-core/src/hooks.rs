//! Hook registry: named, append-only extension points.
//!
//! Callbacks are registered at process wire-up and dispatched strictly in
//! registration order, one at a time — later hooks may depend on state
//! earlier hooks mutated, so no two hooks of one stage ever run
//! concurrently. Serial dispatch stops at the first truthy result.
//!
//! Stage contracts:
//! - `targets`: may rewrite `argv`; returning `true` skips default target
//!   resolution.
//! - `prepare`: may filter or rewrite the target set; all hooks run.
//! - `before`: gate; [`Gate::Abort`] ends the command without a handler,
//!   [`Gate::Replace`] substitutes one.
//! - `trigger`: re-enters the resolve-then-gate sequence for a synthetic
//!   sub-command; returns whether the gate aborted.
//! - observers: fire around the handler; they must not rewrite pipeline
//!   state (argv and targets are restored around them) and their errors are
//!   logged and swallowed.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::locate::LocateOptions;
use crate::pipeline::Monorepo;

/// A command handler (or a `before`-supplied replacement).
pub type Handler =
    Arc<dyn for<'a> Fn(&'a mut Monorepo) -> BoxFuture<'a, Result<()>> + Send + Sync>;

pub type TargetsHook =
    Arc<dyn for<'a> Fn(&'a mut Monorepo, &'a str) -> BoxFuture<'a, Result<bool>> + Send + Sync>;

pub type PrepareHook =
    Arc<dyn for<'a> Fn(&'a mut Monorepo, &'a str) -> BoxFuture<'a, Result<()>> + Send + Sync>;

pub type BeforeHook =
    Arc<dyn for<'a> Fn(&'a mut Monorepo, &'a str) -> BoxFuture<'a, Result<Gate>> + Send + Sync>;

pub type TriggerHook = Arc<
    dyn for<'a> Fn(&'a mut Monorepo, &'a str, LocateOptions) -> BoxFuture<'a, Result<bool>>
        + Send
        + Sync,
>;

/// Observer of a command execution: `(command, positional args)`.
pub type Observer = Arc<
    dyn for<'a> Fn(&'a mut Monorepo, &'a str, &'a [String]) -> BoxFuture<'a, Result<()>>
        + Send
        + Sync,
>;

/// Outcome of the `before` gate.
#[derive(Clone)]
pub enum Gate {
    /// Continue to the registered handler.
    Proceed,
    /// End the command without invoking any handler.
    Abort,
    /// Invoke this handler instead of the registered one.
    Replace(Handler),
}

impl Gate {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Gate::Proceed)
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gate::Proceed => f.write_str("Proceed"),
            Gate::Abort => f.write_str("Abort"),
            Gate::Replace(_) => f.write_str("Replace(..)"),
        }
    }
}

/// Append-only, per-stage callback lists.
#[derive(Clone, Default)]
pub struct HookRegistry {
    pub targets: Vec<TargetsHook>,
    pub prepare: Vec<PrepareHook>,
    pub before: Vec<BeforeHook>,
    pub trigger: Vec<TriggerHook>,
    pub before_execute: Vec<Observer>,
    pub after_execute: Vec<Observer>,
}

impl HookRegistry {
    pub fn add_targets(&mut self, hook: TargetsHook) {
        self.targets.push(hook);
    }

    pub fn add_prepare(&mut self, hook: PrepareHook) {
        self.prepare.push(hook);
    }

    pub fn add_before(&mut self, hook: BeforeHook) {
        self.before.push(hook);
    }

    pub fn add_trigger(&mut self, hook: TriggerHook) {
        self.trigger.push(hook);
    }

    pub fn add_before_execute(&mut self, observer: Observer) {
        self.before_execute.push(observer);
    }

    pub fn add_after_execute(&mut self, observer: Observer) {
        self.after_execute.push(observer);
    }
}
