//! Everything behind `main`: configuration, logging and the commands.
//!
//! - [`config`] - `CliArgs` and the validated `AppConfig`.
//! - [`telemetry`] - `tracing` subscriber setup.
//! - [`commands`] - one handler per subcommand.

pub mod commands;
pub mod config;
pub mod telemetry;
