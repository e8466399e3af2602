//! `run`: execute a manifest script in every target that declares it.
//!
//! Script names travel after `--` so patterns and script can never collide:
//! `monokit run pattern... -- build`. The sweep is sequential; the first
//! failing script stops it and its exit code is propagated.

use std::sync::Arc;

use futures::future::BoxFuture;
use monokit_core::{Error, Monorepo, OptionSchema, Result};
use owo_colors::OwoColorize;

pub fn load(mono: &mut Monorepo) {
    mono.register("run", OptionSchema::new(), Arc::new(handle));
}

fn handle(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let scripts = mono.argv.rest.clone();
        if scripts.is_empty() {
            return Err(Error::Usage(
                "usage: run [patterns...] -- <script>...".to_string(),
            ));
        }
        let targets = mono.targets.clone();
        for path in targets {
            let dir = mono.catalog.dir(&path);
            let wanted: Vec<String> = {
                let Some(manifest) = mono.catalog.get(&path) else {
                    continue;
                };
                scripts
                    .iter()
                    .filter(|script| manifest.has_script(script))
                    .cloned()
                    .collect()
            };
            for script in wanted {
                let shown = if path.is_empty() { "/" } else { path.as_str() };
                let agent = mono.agent.clone();
                let code = agent.run_script(&dir, &script).await?;
                if code != 0 {
                    println!(
                        "{}",
                        format!("script {script} failed in {shown} (exit {code})").red()
                    );
                    mono.propagate_exit(code);
                    return Ok(());
                }
            }
        }
        Ok(())
    })
}
