//! Command-line interface for cmpd

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use crate::assembler::{Assembler, Assembly};
use crate::config::Config;
use crate::transport::HttpTransport;

mod report;

/// Download a modpack and everything it depends on
#[derive(Parser, Debug)]
#[command(name = "cmpd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project id of the modpack
    pub project_id: i64,

    /// Directory the modpack is assembled into [default: modpack]
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Directory of the local artifact store [default: cmpd_store]
    #[arg(short, long)]
    pub store_dir: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, env = "CMPD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog API base URL
    #[arg(long, env = "CMPD_API_BASE")]
    pub api_base: Option<String>,

    /// Log file, rewritten on every run
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Don't draw download progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    /// Load the configuration file and apply flags on top of it
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(dir) = &self.out_dir {
            config.output.dir = dir.clone();
        }
        if let Some(dir) = &self.store_dir {
            config.store.dir = dir.clone();
        }
        if let Some(base) = &self.api_base {
            config.api.base_url = base.clone();
        }
        if let Some(file) = &self.log_file {
            config.log.file = file.clone();
        }
        if self.verbose {
            config.log.level = "debug".to_string();
        }
        if self.no_progress {
            config.store.show_progress = false;
        }

        Ok(config)
    }
}

/// Assemble the requested modpack
pub fn execute(cli: &Cli, config: Config) -> Result<()> {
    let transport = Arc::new(HttpTransport::new(&config.api)?);
    let output = config.output.dir.clone();

    let assembler = Assembler::new(config, transport).context("Failed to open artifact store")?;
    tracing::debug!("Using store {}", assembler.store().root().display());

    match assembler
        .run(cli.project_id)
        .with_context(|| format!("Failed to assemble modpack {}", cli.project_id))?
    {
        Assembly::NoFiles { project_id } => {
            println!(
                "{} Project {} has no downloadable files.",
                "!".yellow(),
                project_id
            );
        }
        Assembly::Complete(assembly) => {
            report::print(&assembly, &output);
        }
    }

    Ok(())
}
