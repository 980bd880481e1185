// flarm-common/src/pipeline.rs
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::FlarmError;

/// Where an install attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallStage {
    Idle,
    ResolvingIdentity,
    CheckingInstalled,
    FetchingAsset,
    Downloading,
    Extracting,
    Moving,
    RecordingMetadata,
    Done,
    Failed,
}

impl InstallStage {
    pub fn describe(&self) -> &'static str {
        match self {
            InstallStage::Idle => "idle",
            InstallStage::ResolvingIdentity => "resolving package identity",
            InstallStage::CheckingInstalled => "checking existing installs",
            InstallStage::FetchingAsset => "looking up release assets",
            InstallStage::Downloading => "downloading",
            InstallStage::Extracting => "extracting",
            InstallStage::Moving => "moving into place",
            InstallStage::RecordingMetadata => "recording metadata",
            InstallStage::Done => "done",
            InstallStage::Failed => "failed",
        }
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    StageChanged {
        stage: InstallStage,
    },
    DownloadStarted {
        asset_name: String,
        url: String,
    },
    /// Whole percent of the download; only sent when the size is known.
    DownloadProgress {
        percent: u8,
    },
    DownloadFinished {
        path: PathBuf,
        size_bytes: u64,
    },
    /// Automatic selection gave up; the user may want to pick manually.
    OfferReleasesPage {
        url: String,
    },
    ShortcutCreated {
        path: PathBuf,
    },
    UninstallStarted {
        path: PathBuf,
    },
    ShortcutRemoved {
        path: PathBuf,
    },
    UninstallFinished {
        path: PathBuf,
    },
    JobSuccess {
        install_path: PathBuf,
        already_installed: bool,
    },
    JobFailed {
        error: String,
        retryable: bool,
    },
    LogInfo {
        message: String,
    },
    LogWarn {
        message: String,
    },
    LogError {
        message: String,
    },
}

impl PipelineEvent {
    pub fn job_failed(error: &FlarmError) -> Self {
        PipelineEvent::JobFailed {
            error: error.to_string(),
            retryable: error.is_retryable(),
        }
    }

    /// Events that close an install or uninstall attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::JobSuccess { .. }
                | PipelineEvent::JobFailed { .. }
                | PipelineEvent::UninstallFinished { .. }
        )
    }
}

pub type EventSender = mpsc::UnboundedSender<PipelineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PipelineEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
