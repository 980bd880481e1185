// flarm-core/src/pipeline/mod.rs
pub mod engine;
pub mod resolve;
pub mod worker;

use flarm_common::pipeline::{EventSender, InstallStage, PipelineEvent};
use tracing::{debug, error, info, warn};

pub use engine::{start_install_worker, start_uninstall_worker};
pub use resolve::{locate_installation, LocatedInstall};
pub use worker::{execute_install, run_install, run_uninstall, InstallOutcome};

/// Publishes pipeline events and mirrors log lines into `tracing`.
///
/// A reporter without a channel only logs, which is what headless callers
/// that don't care about progress use.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    tx: Option<EventSender>,
}

impl Reporter {
    pub fn new(tx: EventSender) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("Event receiver dropped; continuing without progress reporting");
            }
        }
    }

    pub fn stage(&self, stage: InstallStage) {
        debug!("Stage: {}", stage);
        self.send(PipelineEvent::StageChanged { stage });
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.send(PipelineEvent::LogInfo { message });
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.send(PipelineEvent::LogWarn { message });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.send(PipelineEvent::LogError { message });
    }
}
