//! Headless multi-file uploader.
//!
//! Usage: `multiupload [--json] [--uploaded <manifest.json>] <file>...`

mod app;
mod config;

use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing_subscriber::EnvFilter;

use crate::app::Options;

const USAGE: &str = "usage: multiupload [--json] [--uploaded <manifest.json>] <file>...";

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Options> {
    let mut options = Options::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => options.json = true,
            "--uploaded" => {
                let path = args.next().context("--uploaded needs a path")?;
                options.manifest = Some(PathBuf::from(path));
            }
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
            _ => options.files.push(PathBuf::from(arg)),
        }
    }

    if options.files.is_empty() && options.manifest.is_none() {
        bail!(USAGE);
    }
    Ok(options)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,multiupload=debug")),
        )
        .init();

    let options = parse_args(std::env::args().skip(1))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        files = options.files.len(),
        "starting uploader"
    );

    let config = config::Config::load()?;
    tracing::info!(base_url = %config.base_url, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, options))?;

    tracing::info!("uploader finished");
    Ok(())
}
