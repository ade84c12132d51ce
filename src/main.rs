mod app;
mod archive;
mod chat;
mod cli;
mod config;
mod domain;
mod infrastructure;
mod tasks;
mod transcript;

use std::process;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = cli::Args::parse();

    let config = match config::load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            process::exit(1);
        }
    };
    let paths = directories::ensure_directories(&config.directories, args.target_folder.as_deref())?;
    logging::init_tracing(&config.logging, &paths)?;

    let today = Utc::now().date_naive();
    let job = args.into_job(paths.archive_root.clone(), today);
    if job.is_empty() {
        tracing::error!(
            target: "config",
            channels = job.channels().len(),
            data_types = job.data_types().len(),
            dates = job.dates().count(),
            "nothing to archive: need at least one channel, data type and past date"
        );
        process::exit(1);
    }

    let shutdown = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(&shutdown);

    let app = app::ArchiverApp::initialize(config, paths, job, shutdown)?;
    app.run().await?;
    Ok(())
}
