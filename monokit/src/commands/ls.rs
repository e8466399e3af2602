//! `ls` / `list`: print located workspaces.

use std::sync::Arc;

use futures::future::BoxFuture;
use monokit_core::{Monorepo, OptionSchema, Result};
use owo_colors::OwoColorize;

pub fn load(mono: &mut Monorepo) {
    let schema = OptionSchema::new().flag("root", Some('R'));
    mono.register("ls", schema.clone(), Arc::new(handle));
    mono.register("list", schema, Arc::new(handle));
}

fn handle(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        for path in &mono.targets {
            let Some(manifest) = mono.catalog.get(path) else {
                continue;
            };
            let shown = if path.is_empty() { "/" } else { path.as_str() };
            println!("{} -> {}", manifest.name().green(), shown.cyan());
        }
        println!(
            "{}",
            format!("Total: {} workspaces.", mono.targets.len()).yellow()
        );
        Ok(())
    })
}
