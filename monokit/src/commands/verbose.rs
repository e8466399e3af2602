//! `verbose`: echo every nested execution while running a sub-command.

use std::sync::Arc;

use futures::future::BoxFuture;
use monokit_core::{Error, Monorepo, OptionSchema, Result};
use owo_colors::OwoColorize;

pub fn load(mono: &mut Monorepo) {
    mono.register("verbose", OptionSchema::new().manual(), Arc::new(handle));
}

fn handle(mono: &mut Monorepo) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let mut args = mono.argv.positional.clone();
        if args.is_empty() {
            return Err(Error::Usage(
                "usage: verbose <command> [args...]".to_string(),
            ));
        }
        let sub = args.remove(0);
        if !mono.argv.rest.is_empty() {
            args.push("--".to_string());
            args.extend(mono.argv.rest.clone());
        }

        let mark = mono.hooks.before_execute.len();
        mono.hooks.add_before_execute(Arc::new(echo_observer));
        let result = mono.execute(&sub, &args).await;
        mono.hooks.before_execute.truncate(mark);
        result
    })
}

fn echo_observer<'a>(
    _mono: &'a mut Monorepo,
    name: &'a str,
    args: &'a [String],
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        println!("{}", format!("$ {} {}", name, args.join(" ")).dimmed());
        Ok(())
    })
}
