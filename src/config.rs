use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Student gradebook sidecar: JSON requests on stdin, JSON responses on stdout.
#[derive(Debug, Parser)]
#[command(name = "gradebookd", version, about)]
pub struct Config {
    /// Workspace directory to open at startup.
    #[arg(long, env = "GRADEBOOKD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Log filter, e.g. `info` or `gradebookd=debug`.
    #[arg(long = "log", env = "GRADEBOOKD_LOG", default_value = "warn")]
    pub log_filter: String,
}

/// Logs go to stderr; stdout is reserved for protocol responses.
pub fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
