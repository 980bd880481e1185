// flarm/src/cli/install.rs
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use flarm_common::pipeline::event_channel;
use flarm_common::remote::RemoteRepository;
use flarm_core::pipeline::start_install_worker;
use flarm_net::GithubClient;
use tracing::debug;

use crate::cli::{parse_request, status};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// A flarmstore://owner.repo link or a path to an .iflapp package
    #[arg(required = true)]
    pub request: String,
}

impl InstallArgs {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let request = parse_request(&self.request, config)?;
        let label = request.label();
        println!("Installing {}...", label.cyan());

        // The client moves into the worker and is dropped there, off the
        // async runtime.
        let client: Arc<dyn RemoteRepository> = Arc::new(GithubClient::new(config));
        let (event_tx, event_rx) = event_channel();
        let handle = start_install_worker(config.clone(), client, request, event_tx)?;

        let summary = status::handle_events(&label, event_rx).await;
        tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_err(|e| FlarmError::Generic(format!("Install task failed: {e}")))?
            .map_err(|_| FlarmError::Generic("Install worker panicked".to_string()))?;
        debug!("Install summary: {:?}", summary);

        match (summary.succeeded, summary.install_path) {
            (true, Some(path)) if summary.already_installed => {
                println!(
                    "{} {} is already installed at {}",
                    "✓".green().bold(),
                    label.green(),
                    path.display()
                );
                Ok(())
            }
            (true, Some(path)) => {
                println!(
                    "{} Installed {} to {}",
                    "✓".green().bold(),
                    label.green(),
                    path.display()
                );
                Ok(())
            }
            _ => Err(FlarmError::InstallError(
                summary
                    .error
                    .unwrap_or_else(|| format!("Installing {label} did not finish")),
            )),
        }
    }
}
