// flarm/src/cli/uninstall.rs
use clap::Args;
use colored::Colorize;
use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use flarm_common::pipeline::event_channel;
use flarm_core::pipeline::start_uninstall_worker;
use tracing::debug;

use crate::cli::{locate_or_fail, status};

#[derive(Args, Debug)]
pub struct Uninstall {
    /// The link or package file the app was installed from
    #[arg(required = true)]
    pub request: String,
}

impl Uninstall {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let located = locate_or_fail(&self.request, config).await?;
        let title = located.title().to_string();
        let path = located.installed.path.clone();
        println!("Uninstalling {}...", title.cyan());
        debug!("Install record: {}", path.display());

        let (event_tx, event_rx) = event_channel();
        let handle = start_uninstall_worker(config.clone(), path.clone(), title.clone(), event_tx)?;
        let summary = status::handle_events(&title, event_rx).await;
        tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_err(|e| FlarmError::Generic(format!("Uninstall task failed: {e}")))?
            .map_err(|_| FlarmError::Generic("Uninstall worker panicked".to_string()))?;

        if summary.succeeded {
            println!(
                "{} Uninstalled {} ({})",
                "✓".green().bold(),
                title.green(),
                path.display()
            );
            Ok(())
        } else {
            Err(FlarmError::UninstallError(
                summary
                    .error
                    .unwrap_or_else(|| format!("Removing {title} did not finish")),
            ))
        }
    }
}
