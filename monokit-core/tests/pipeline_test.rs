mod common;

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use common::{FakeAgent, FakeGit, FakeRegistry};
use futures::future::BoxFuture;
use monokit_core::{
    Config, Error, Gate, LocateOptions, Monorepo, OptionSchema, Result,
};
use tempfile::TempDir;

fn write_manifest(dir: &Path, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("package.json"), content).unwrap();
}

fn write_fixture(root: &Path) {
    write_manifest(
        root,
        "{\n  \"name\": \"fixture-root\",\n  \"workspaces\": [\n    \"packages/*\"\n  ]\n}\n",
    );
    write_manifest(&root.join("packages/a"), "{\n  \"name\": \"a\"\n}\n");
    write_manifest(&root.join("packages/b"), "{\n  \"name\": \"b\"\n}\n");
}

fn wire(root: &Path, config: Config) -> Monorepo {
    Monorepo::with_collaborators(
        root,
        config,
        Arc::new(FakeGit::new()),
        Arc::new(FakeAgent::new(0)),
        Arc::new(FakeRegistry::new()),
    )
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

static SEEN_DEFAULT: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn probe_default(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        SEEN_DEFAULT.lock().unwrap().clone_from(&mono.targets);
        Ok(())
    })
}

#[tokio::test]
async fn default_resolution_targets_all_leaves() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut mono = wire(tmp.path(), Config::default());
    mono.register("probe", OptionSchema::new(), Arc::new(probe_default));

    mono.execute("probe", &[]).await.unwrap();
    assert_eq!(
        *SEEN_DEFAULT.lock().unwrap(),
        vec!["/packages/a", "/packages/b"]
    );
}

static SEEN_PATTERN: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn probe_pattern(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        SEEN_PATTERN.lock().unwrap().clone_from(&mono.targets);
        Ok(())
    })
}

#[tokio::test]
async fn positional_patterns_narrow_the_target_set() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut mono = wire(tmp.path(), Config::default());
    mono.register("probe", OptionSchema::new(), Arc::new(probe_pattern));

    mono.execute("probe", &args(&["a"])).await.unwrap();
    assert_eq!(*SEEN_PATTERN.lock().unwrap(), vec!["/packages/a"]);
}

#[tokio::test]
async fn unknown_command_fails() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut mono = wire(tmp.path(), Config::default());
    let err = mono.execute("nonsense", &[]).await.unwrap_err();
    assert!(matches!(err, Error::UnknownCommand(name) if name == "nonsense"));
}

static HOOK_TRACE: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn tracing_targets_one<'a>(
    _mono: &'a mut Monorepo,
    _name: &'a str,
) -> BoxFuture<'a, Result<bool>> {
    Box::pin(async move {
        HOOK_TRACE.lock().unwrap().push("one");
        Ok(false)
    })
}

fn claiming_targets_two<'a>(
    mono: &'a mut Monorepo,
    _name: &'a str,
) -> BoxFuture<'a, Result<bool>> {
    Box::pin(async move {
        HOOK_TRACE.lock().unwrap().push("two");
        mono.targets = vec!["/packages/b".to_string()];
        Ok(true)
    })
}

fn tracing_targets_three<'a>(
    _mono: &'a mut Monorepo,
    _name: &'a str,
) -> BoxFuture<'a, Result<bool>> {
    Box::pin(async move {
        HOOK_TRACE.lock().unwrap().push("three");
        Ok(false)
    })
}

static SEEN_HOOKED: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn probe_hooked(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        SEEN_HOOKED.lock().unwrap().clone_from(&mono.targets);
        Ok(())
    })
}

#[tokio::test]
async fn serial_targets_dispatch_short_circuits_on_first_truthy() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut mono = wire(tmp.path(), Config::default());
    mono.hooks.add_targets(Arc::new(tracing_targets_one));
    mono.hooks.add_targets(Arc::new(claiming_targets_two));
    mono.hooks.add_targets(Arc::new(tracing_targets_three));
    mono.register("probe", OptionSchema::new(), Arc::new(probe_hooked));

    mono.execute("probe", &[]).await.unwrap();
    // The hook after the claiming one never ran, and the claimed target set
    // replaced default resolution.
    assert_eq!(*HOOK_TRACE.lock().unwrap(), vec!["one", "two"]);
    assert_eq!(*SEEN_HOOKED.lock().unwrap(), vec!["/packages/b"]);
}

static RAN_ORIGINAL: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn original_handler(_mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        RAN_ORIGINAL.lock().unwrap().push("original");
        Ok(())
    })
}

fn aborting_before<'a>(_mono: &'a mut Monorepo, _name: &'a str) -> BoxFuture<'a, Result<Gate>> {
    Box::pin(async move { Ok(Gate::Abort) })
}

#[tokio::test]
async fn before_gate_abort_skips_the_handler() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut mono = wire(tmp.path(), Config::default());
    mono.hooks.add_before(Arc::new(aborting_before));
    mono.register("guarded", OptionSchema::new(), Arc::new(original_handler));

    mono.execute("guarded", &[]).await.unwrap();
    assert!(RAN_ORIGINAL.lock().unwrap().is_empty());
}

static RAN_REPLACED: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn replaced_original(_mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        RAN_REPLACED.lock().unwrap().push("original");
        Ok(())
    })
}

fn replacement_handler(_mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        RAN_REPLACED.lock().unwrap().push("replacement");
        Ok(())
    })
}

fn replacing_before<'a>(_mono: &'a mut Monorepo, _name: &'a str) -> BoxFuture<'a, Result<Gate>> {
    Box::pin(async move { Ok(Gate::Replace(Arc::new(replacement_handler))) })
}

#[tokio::test]
async fn before_gate_can_replace_the_handler() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut mono = wire(tmp.path(), Config::default());
    mono.hooks.add_before(Arc::new(replacing_before));
    mono.register("swapped", OptionSchema::new(), Arc::new(replaced_original));

    mono.execute("swapped", &[]).await.unwrap();
    assert_eq!(*RAN_REPLACED.lock().unwrap(), vec!["replacement"]);
}

static PIPE_CALLS: Mutex<Vec<(String, Vec<String>)>> = Mutex::new(Vec::new());

fn pipe_alpha(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        PIPE_CALLS
            .lock()
            .unwrap()
            .push(("alpha".to_string(), mono.argv.positional.clone()));
        Ok(())
    })
}

fn pipe_beta(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        PIPE_CALLS
            .lock()
            .unwrap()
            .push(("beta".to_string(), mono.argv.positional.clone()));
        Ok(())
    })
}

fn pipe_gamma(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        PIPE_CALLS
            .lock()
            .unwrap()
            .push(("gamma".to_string(), mono.argv.positional.clone()));
        Ok(())
    })
}

#[tokio::test]
async fn pipeline_subinvocations_inherit_trailing_args() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut config = Config::default();
    config.pipeline.insert(
        "release".to_string(),
        vec![
            "alpha".to_string(),
            "beta b".to_string(),
            "gamma -- b".to_string(),
        ],
    );
    let mut mono = wire(tmp.path(), config);
    mono.register("alpha", OptionSchema::new(), Arc::new(pipe_alpha));
    mono.register("beta", OptionSchema::new(), Arc::new(pipe_beta));
    mono.register("gamma", OptionSchema::new(), Arc::new(pipe_gamma));

    mono.execute("release", &args(&["a"])).await.unwrap();
    let calls = PIPE_CALLS.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    // Inherited args are appended after a sub-invocation's own args, unless
    // a separator splits them into before and after halves.
    assert_eq!(calls[0], ("alpha".to_string(), args(&["a"])));
    assert_eq!(calls[1], ("beta".to_string(), args(&["b", "a"])));
    assert_eq!(calls[2], ("gamma".to_string(), args(&["a", "b"])));
}

static RAN_OBSERVED: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn observed_handler(_mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        RAN_OBSERVED.lock().unwrap().push("handler");
        Ok(())
    })
}

fn failing_observer<'a>(
    _mono: &'a mut Monorepo,
    _name: &'a str,
    _args: &'a [String],
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move { Err(Error::Agent("observer exploded".to_string())) })
}

#[tokio::test]
async fn observer_failures_are_swallowed() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut mono = wire(tmp.path(), Config::default());
    mono.hooks.add_before_execute(Arc::new(failing_observer));
    mono.hooks.add_after_execute(Arc::new(failing_observer));
    mono.register("observed", OptionSchema::new(), Arc::new(observed_handler));

    mono.execute("observed", &[]).await.unwrap();
    assert_eq!(*RAN_OBSERVED.lock().unwrap(), vec!["handler"]);
}

static SEEN_SCOPED: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn probe_scoped(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        SEEN_SCOPED.lock().unwrap().clone_from(&mono.targets);
        Ok(())
    })
}

#[tokio::test]
async fn command_scope_exclude_patterns_subtract_targets() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut config = Config::default();
    let mut scope = monokit_core::config::CommandScope::default();
    scope.exclude_patterns = vec!["b".to_string(), "stale-*".to_string()];
    config.commands.insert("scoped".to_string(), scope);
    let mut mono = wire(tmp.path(), config);
    mono.register("scoped", OptionSchema::new(), Arc::new(probe_scoped));

    mono.execute("scoped", &[]).await.unwrap();
    // `b` is excluded; the pattern matching nothing is a no-op.
    assert_eq!(*SEEN_SCOPED.lock().unwrap(), vec!["/packages/a"]);
}

static SEEN_TRIGGERED: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn probe_triggering(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let aborted = mono
            .trigger("probe-trigger", LocateOptions::with_root(true))
            .await?;
        assert!(!aborted);
        SEEN_TRIGGERED.lock().unwrap().clone_from(&mono.targets);
        Ok(())
    })
}

#[tokio::test]
async fn trigger_reenters_resolution_with_new_options() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut mono = wire(tmp.path(), Config::default());
    mono.register(
        "probe-trigger",
        OptionSchema::new().manual(),
        Arc::new(probe_triggering),
    );

    mono.execute("probe-trigger", &[]).await.unwrap();
    // Root inclusion pulled the aggregator in.
    assert_eq!(
        *SEEN_TRIGGERED.lock().unwrap(),
        vec!["", "/packages/a", "/packages/b"]
    );
}

static SEEN_ALIASED: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn probe_aliased(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        SEEN_ALIASED.lock().unwrap().clone_from(&mono.targets);
        Ok(())
    })
}

#[tokio::test]
async fn config_alias_resolves_through_execute() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let mut config = Config::default();
    config.alias.insert(
        "short".to_string(),
        monokit_core::config::AliasTargets::One("/packages/b".to_string()),
    );
    let mut mono = wire(tmp.path(), config);
    mono.register("aliased", OptionSchema::new(), Arc::new(probe_aliased));

    mono.execute("aliased", &args(&["short"])).await.unwrap();
    assert_eq!(*SEEN_ALIASED.lock().unwrap(), vec!["/packages/b"]);
}
