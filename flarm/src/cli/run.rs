// flarm/src/cli/run.rs
use clap::Args;
use colored::Colorize;
use flarm_common::config::Config;
use flarm_common::error::Result;
use flarm_core::launch_installed;
use tracing::debug;

use crate::cli::locate_or_fail;

#[derive(Args, Debug)]
pub struct Run {
    /// The link or package file the app was installed from
    #[arg(required = true)]
    pub request: String,
}

impl Run {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let located = locate_or_fail(&self.request, config).await?;
        let child = launch_installed(&located.installed.path, &located.short_name)?;
        debug!("Spawned pid {}", child.id());
        println!("{} Started {}", "✓".green().bold(), located.title().cyan());
        Ok(())
    }
}
