//! `upgrade`: bump external dependency ranges across the target set.

use std::sync::Arc;

use futures::future::BoxFuture;
use monokit_core::{LocateOptions, Monorepo, OptionSchema, Result, UpgradeEngine};
use owo_colors::OwoColorize;

pub fn load(mono: &mut Monorepo) {
    let schema = OptionSchema::new().flag("dry", Some('d')).flag("next", None);
    mono.register("upgrade", schema, Arc::new(handle));
}

fn handle(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let patterns = mono.argv.positional.clone();
        let paths = mono.locate(&patterns, &LocateOptions::with_root(true))?;

        let engine = UpgradeEngine::new(mono.config.upgrade.concurrency)
            .with_next(mono.argv.flag("next"));
        let fetcher = mono.registry.clone();
        let outcome = engine.run(&mut mono.catalog, &paths, fetcher).await?;

        if mono.argv.flag("dry") {
            if !outcome.lines.is_empty() {
                println!("{}", outcome.lines.join("\n"));
            }
            println!("{}", "Nothing changed.".bold());
            return Ok(());
        }

        let saved = mono.catalog.save_dirty()?;
        if !outcome.lines.is_empty() {
            println!("{}", outcome.lines.join("\n"));
        }
        if saved == 0 {
            println!("{}", "Everything is up to date.".green());
            return Ok(());
        }

        let agent = mono.agent.clone();
        let cwd = mono.cwd.clone();
        let code = agent.install(&cwd).await?;
        if code != 0 {
            mono.propagate_exit(code);
        }
        Ok(())
    })
}
