//! Built-in command implementations and the lazy loader table.

mod git;
mod ls;
mod run;
mod upgrade;
mod verbose;

use monokit_core::Monorepo;

/// Installs the built-in loader table. Commands are registered lazily the
/// first time they are executed.
pub fn install(mono: &mut Monorepo) {
    mono.register_loader("ls", ls::load);
    mono.register_loader("list", ls::load);
    mono.register_loader("run", run::load);
    mono.register_loader("upgrade", upgrade::load);
    mono.register_loader("git", git::load);
    mono.register_loader("verbose", verbose::load);
}

/// Banner shown when no command is given.
pub fn banner(mono: &Monorepo) -> String {
    let mut out = format!(
        "monokit v{}\n\nusage: monokit <command> [patterns...] [--flags]\n\ncommands:\n",
        env!("CARGO_PKG_VERSION")
    );
    for name in mono.command_names() {
        match mono.entry(&name) {
            Some(entry) => out.push_str(&format!("  {}\n", entry.schema.describe(&name))),
            None => out.push_str(&format!("  {name}\n")),
        }
    }
    out
}
