//! Route Stores console entry point.
//!
//! # Responsibility
//! - Resolve configuration from flags, environment and `.env`.
//! - Start channel-routed file logging and verify the document store.
//! - Hand stdin/stdout to the interactive menu session.

mod args;
mod import;
mod menu;

use anyhow::{anyhow, Context};
use log::info;
use routesol_core::{
    core_version, init_logging, Channel, ConnectionManager, CredentialService, StoreService,
};
use std::io;

fn main() -> anyhow::Result<()> {
    let cli = args::parse();

    let log_dir = cli
        .resolved_log_dir()
        .context("resolve log directory")?;
    let logs = init_logging(cli.log_level(), &log_dir.to_string_lossy())
        .map_err(|err| anyhow!("logging init failed: {err}"))?;
    info!(
        target: "routesol::console",
        "event=startup module=console status=ok version={} log_dir={}",
        core_version(),
        log_dir.display()
    );

    let connections =
        ConnectionManager::new(&cli.connection_string, logs.channel(Channel::Connection))
            .context("invalid connection string")?;
    connections
        .verify()
        .with_context(|| format!("document store {} is unreachable", connections.target()))?;

    let stores = StoreService::new(connections.clone(), cli.stores_namespace.clone(), &logs);
    let users = CredentialService::new(connections, cli.users_namespace.clone(), &logs);

    let stdin = io::stdin();
    let stdout = io::stdout();
    menu::Session::new(&stores, &users, stdin.lock(), stdout.lock(), true)
        .run()
        .context("console session failed")?;

    Ok(())
}
