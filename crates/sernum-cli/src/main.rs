#![doc = include_str!("../README.md")]

mod app;

use anyhow::Context;
use app::commands;
use app::config::{AppConfig, CliArgs};
use app::telemetry::init_telemetry;
use clap::Parser;
use sernum::SqliteStore;

// mimalloc performs better than the system allocator, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry()?;

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("cannot open database {}", config.db_path.display()))?;
    tracing::debug!(db = %config.db_path.display(), "database opened");

    let result = commands::run(&store, &config, &mut std::io::stdout().lock());
    let closed = store.close().context("failed to close database");
    result?;
    closed
}
