mod commands;

use std::process;

use anyhow::Context;
use monokit_core::{Config, Monorepo};
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next();
    let rest: Vec<String> = args.collect();

    let mut mono = match bootstrap() {
        Ok(mono) => mono,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red());
            process::exit(1);
        }
    };

    let Some(command) = command else {
        print!("{}", commands::banner(&mono));
        return;
    };

    match mono.execute(&command, &rest).await {
        Ok(()) => process::exit(mono.exit_code),
        Err(error) => {
            eprintln!("{} {error}", "error:".red());
            process::exit(1);
        }
    }
}

fn bootstrap() -> anyhow::Result<Monorepo> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let config = Config::load(&cwd).context("cannot load monokit.toml")?;
    debug!(cwd = %cwd.display(), "wiring orchestrator");
    let mut mono = Monorepo::new(cwd, config);
    commands::install(&mut mono);
    Ok(mono)
}
