// flarm/src/cli/status.rs
use std::path::PathBuf;
use std::time::Duration;

use colored::*;
use flarm_common::pipeline::{EventReceiver, InstallStage, PipelineEvent};
use indicatif::{ProgressBar, ProgressStyle};

/// What the terminal event of a job said.
#[derive(Debug, Default)]
pub struct JobSummary {
    pub succeeded: bool,
    pub already_installed: bool,
    pub install_path: Option<PathBuf>,
    pub error: Option<String>,
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn create_download_bar(asset_name: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{msg:<32!} [{bar:30.cyan/blue}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(asset_name.to_string());
    pb
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "kB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit_idx = 0;

    while value >= 1000.0 && unit_idx < UNITS.len() - 1 {
        value /= 1000.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{bytes}B")
    } else {
        format!("{:.1}{}", value, UNITS[unit_idx])
    }
}

struct StatusDisplay {
    spinner: ProgressBar,
    download: Option<ProgressBar>,
    asset_name: String,
    summary: JobSummary,
}

impl StatusDisplay {
    fn new(title: &str) -> Self {
        Self {
            spinner: create_spinner(title),
            download: None,
            asset_name: String::new(),
            summary: JobSummary::default(),
        }
    }

    fn line(&self, text: String) {
        match &self.download {
            Some(bar) => bar.suspend(|| println!("{text}")),
            None => self.spinner.suspend(|| println!("{text}")),
        }
    }

    fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::StageChanged { stage } => match stage {
                InstallStage::Done | InstallStage::Failed => self.spinner.finish_and_clear(),
                _ => self.spinner.set_message(stage.describe().to_string()),
            },
            PipelineEvent::DownloadStarted { asset_name, url } => {
                self.line(format!("{} {} {}", "↓".yellow(), asset_name.cyan(), url.dimmed()));
                self.asset_name = asset_name;
            }
            PipelineEvent::DownloadProgress { percent } => {
                let asset_name = &self.asset_name;
                let bar = self
                    .download
                    .get_or_insert_with(|| create_download_bar(asset_name));
                bar.set_position(u64::from(percent));
            }
            PipelineEvent::DownloadFinished { size_bytes, .. } => {
                if let Some(bar) = self.download.take() {
                    bar.finish_and_clear();
                }
                self.line(format!(
                    "{} Downloaded {} ({})",
                    "✓".green(),
                    self.asset_name,
                    format_bytes(size_bytes)
                ));
            }
            PipelineEvent::OfferReleasesPage { url } => {
                self.line(format!(
                    "{} Pick a package manually from {}",
                    "hint:".blue().bold(),
                    url.underline()
                ));
            }
            PipelineEvent::ShortcutCreated { path } => {
                self.line(format!("{} Shortcut {}", "✓".green(), path.display()));
            }
            PipelineEvent::UninstallStarted { path } => {
                self.spinner
                    .set_message(format!("removing {}", path.display()));
            }
            PipelineEvent::ShortcutRemoved { path } => {
                self.line(format!("{} Removed shortcut {}", "✓".green(), path.display()));
            }
            PipelineEvent::UninstallFinished { path } => {
                self.spinner.finish_and_clear();
                self.summary.succeeded = true;
                self.summary.install_path = Some(path);
            }
            PipelineEvent::JobSuccess {
                install_path,
                already_installed,
            } => {
                self.spinner.finish_and_clear();
                self.summary.succeeded = true;
                self.summary.already_installed = already_installed;
                self.summary.install_path = Some(install_path);
            }
            PipelineEvent::JobFailed { error, retryable } => {
                self.spinner.finish_and_clear();
                let hint = if retryable {
                    " (temporary problem, try again)".dimmed().to_string()
                } else {
                    String::new()
                };
                self.line(format!("{} {}{}", "✗".red().bold(), error.red(), hint));
                self.summary.succeeded = false;
                self.summary.error = Some(error);
            }
            PipelineEvent::LogInfo { message } => {
                self.line(format!("{} {}", "·".dimmed(), message));
            }
            PipelineEvent::LogWarn { message } => {
                self.line(format!("{} {}", "Warning:".yellow(), message));
            }
            PipelineEvent::LogError { message } => {
                self.line(format!("{} {}", "Error:".red(), message));
            }
        }
    }
}

/// Renders pipeline events until the worker drops its sender.
pub async fn handle_events(title: &str, mut event_rx: EventReceiver) -> JobSummary {
    let mut display = StatusDisplay::new(title);
    while let Some(event) = event_rx.recv().await {
        display.handle(event);
    }
    display.spinner.finish_and_clear();
    if let Some(bar) = display.download.take() {
        bar.finish_and_clear();
    }
    display.summary
}
