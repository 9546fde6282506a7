//! # opencode-ctl
//!
//! Command line controller for a local opencode server.
//!
//! ## Overview
//!
//! The binary provides commands for:
//! - Server lifecycle (health, serve)
//! - Session management (create, list, show, delete, abort, share)
//! - Messaging (send, messages, diff)
//! - Waiting for completion (wait, run)
//!
//! ## Architecture
//!
//! This is the top layer, tying together:
//! - opencode-ctl-core: Shared types and configuration
//! - opencode-ctl-server: Server supervision
//! - opencode-ctl-session: API client and session operations
//!
//! All work is blocking; it runs on a tokio blocking thread so Ctrl-C can
//! cancel an in-progress wait. A second Ctrl-C exits with status 130.

use clap::Parser;
use opencode_ctl::{commands, interrupt, Cli, Supervised, INTERRUPTED_EXIT_CODE};
use opencode_ctl_session::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Initialize logging; RUST_LOG wins over the config file
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        "opencode-ctl v{} using server {}",
        env!("CARGO_PKG_VERSION"),
        config.server.base_url()
    );

    let json = cli.json;
    let cancel = CancellationToken::new();
    let worker = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || commands::run(&cli.command, config, &cancel))
    };

    let result = match interrupt::supervise(worker, &cancel, interrupt::ctrl_c).await {
        Supervised::Finished(result) => result,
        Supervised::Abandoned => std::process::exit(INTERRUPTED_EXIT_CODE),
    };

    let report = result??;
    println!("{}", report.render(json));
    Ok(())
}
