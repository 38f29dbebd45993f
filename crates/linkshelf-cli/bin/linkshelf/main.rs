mod cli;
mod preview;
mod telemetry;
mod view;

use crate::cli::{Command, CLI};
use anyhow::Context;
use clap::Parser;
use linkshelf_cache::FileKeyValueStore;
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    telemetry::init(config.log_format);

    debug!(data_dir = %config.data_dir.display(), user = %config.user, "starting linkshelf");

    let store = FileKeyValueStore::open(&config.data_dir)
        .await
        .context("failed to open the data directory")?;

    match config.command {
        Command::View(args) => view::run(store, &config.user, args).await,
        Command::Preview(args) => preview::run(store, args).await,
    }
}
