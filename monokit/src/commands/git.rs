//! `git`: batched version-control operations over the target set.

use std::sync::Arc;

use futures::future::BoxFuture;
use monokit_core::gitactions::{self, GitActionContext};
use monokit_core::{
    run_batch, BatchMember, BatchOptions, Error, LocateOptions, Monorepo, OptionSchema, Result,
};
use owo_colors::OwoColorize;

pub fn load(mono: &mut Monorepo) {
    let schema = OptionSchema::new()
        .flag("dry", Some('d'))
        .flag("root", Some('R'))
        .option("message", Some('m'), Some(""))
        .option("remote", Some('r'), None)
        .option("branch", Some('b'), None)
        .option("working-directories", Some('W'), None)
        .manual();
    mono.register("git", schema, Arc::new(handle));
}

fn usage() -> Error {
    Error::Usage(format!(
        "usage: git <{}> [patterns...]",
        gitactions::subcommand_names().join("|")
    ))
}

fn handle(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let Some(sub) = mono.argv.shift() else {
            return Err(usage());
        };
        let Some((op, policy)) = gitactions::lookup(&sub) else {
            return Err(usage());
        };

        // Re-enter resolution with repository roots included; remaining
        // positionals are the patterns.
        if mono.trigger("git", LocateOptions::with_root(true)).await? {
            return Ok(());
        }

        let members: Vec<BatchMember> = mono
            .targets
            .iter()
            .filter_map(|path| {
                mono.catalog.get(path).map(|manifest| BatchMember {
                    path: path.clone(),
                    dir: mono.catalog.dir(path),
                    is_aggregator: manifest.is_aggregator(),
                })
            })
            .collect();

        let ctx = Arc::new(GitActionContext {
            message: mono.argv.get("message").unwrap_or("").to_string(),
            remote: mono.argv.get("remote").map(String::from),
            branch: mono.argv.get("branch").map(String::from),
            working_dirs: mono.argv.get("working-directories").map(String::from),
            dry: mono.argv.flag("dry"),
        });
        let options = BatchOptions {
            include_root: mono.argv.flag("root"),
            ..BatchOptions::default()
        };

        let count = run_batch(
            members,
            mono.git.clone(),
            gitactions::make_action(op, ctx),
            policy,
            &options,
        )
        .await?;
        println!(
            "{}",
            format!("Successfully processed {count} repositories").green()
        );
        Ok(())
    })
}
