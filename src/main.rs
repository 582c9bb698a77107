//! modhost binary.
//!
//! Headless entry point: builds and loads every module archive under the
//! host root, then serves events until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use modhost::build::ScriptTranspiler;
use modhost::config::{HostConfig, HostPaths};
use modhost::host::Host;
use modhost::module::{ManifestModuleFactory, NullRenderer};
use modhost::utils::init_logging;

#[derive(Parser, Debug)]
#[command(name = "modhost", about = "Plugin host", version)]
struct Args {
    /// Use the development root directory instead of the normal one.
    #[arg(long)]
    dev: bool,

    /// Recompile every module, ignoring the build cache.
    #[arg(long)]
    force_reload: bool,

    /// Explicit host root; overrides --dev.
    #[arg(long, value_name = "PATH")]
    root: Option<PathBuf>,

    /// Path to a TOML config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, value_name = "FILTER")]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };

    if let Some(root) = args.root {
        config.paths = HostPaths::new(root);
    } else if args.dev {
        config.paths = HostPaths::in_home(true);
    }
    if args.force_reload {
        config.force_reload = true;
    }
    if args.log_filter.is_some() {
        config.log_filter = args.log_filter;
    }

    init_logging(config.log_filter.as_deref());
    info!(root = %config.paths.root.display(), "starting host");

    let mut host = Host::start(
        config,
        Arc::new(NullRenderer),
        Arc::new(ManifestModuleFactory),
        Arc::new(ScriptTranspiler),
    )
    .await?;

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    host.stop().await;
    Ok(())
}
