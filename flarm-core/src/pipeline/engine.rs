// flarm-core/src/pipeline/engine.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use flarm_common::config::Config;
use flarm_common::error::{FlarmError, Result};
use flarm_common::model::InstallRequest;
use flarm_common::pipeline::EventSender;
use flarm_common::remote::RemoteRepository;
use tracing::{debug, instrument};

use super::{worker, Reporter};

/// Runs one install on its own thread so the caller's event loop stays
/// responsive. The thread ends after the terminal event is sent.
#[instrument(skip_all, name = "install_worker", fields(request = %request.label()))]
pub fn start_install_worker(
    config: Config,
    client: Arc<dyn RemoteRepository>,
    request: InstallRequest,
    event_tx: EventSender,
) -> Result<JoinHandle<()>> {
    let thread_name = format!("flarm-install-{}", request.short_name());
    debug!("Spawning {}", thread_name);

    thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            let reporter = Reporter::new(event_tx);
            let result = worker::run_install(&request, &config, client.as_ref(), &reporter);
            debug!(
                "[{}] Install worker finished, result ok: {}",
                request.label(),
                result.is_ok()
            );
        })
        .map_err(|e| FlarmError::from_io(e, "Failed to spawn install worker"))
}

#[instrument(skip_all, name = "uninstall_worker", fields(path = %install_dir.display()))]
pub fn start_uninstall_worker(
    config: Config,
    install_dir: PathBuf,
    display_name: String,
    event_tx: EventSender,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("flarm-uninstall".to_string())
        .spawn(move || {
            let reporter = Reporter::new(event_tx);
            let result = worker::run_uninstall(&install_dir, &display_name, &config, &reporter);
            debug!(
                "[{}] Uninstall worker finished, result ok: {}",
                install_dir.display(),
                result.is_ok()
            );
        })
        .map_err(|e| FlarmError::from_io(e, "Failed to spawn uninstall worker"))
}
