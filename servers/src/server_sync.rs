use anyhow::Result;
use lib_sync::workflow::{spawn_task, CycleTask};
use std::time::Duration;
use tokio::signal;

mod sync_logic;
use sync_logic::{config, frontdoor, logger, state};

// How long the front door may take to drain after shutdown is signalled
const GRACE_PERIOD: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let server_config = config::load_config()?;
    logger::setup_logging(&server_config.log_dir, &server_config.log_level)?;
    log::info!("{}", server_config.sync);
    if let Err(e) = server_config.sync.validate() {
        log::warn!("{}. Sync cycles will fail until it is set.", e);
    }

    // A store that cannot be opened (lock held elsewhere, bad path) is fatal
    let app_state = state::AppState::build(server_config.sync.clone())?;
    let interval = app_state.config.sync_interval();

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let mut task_handles = Vec::new();
    for task in app_state.sync_tasks() {
        log::info!("Starting task {}", task.name());
        task_handles.push(spawn_task(task, interval, shutdown_tx.subscribe()));
    }

    let frontdoor_handle = tokio::spawn(frontdoor::run(app_state.clone(), shutdown_tx.subscribe()));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::warn!("Cannot listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(GRACE_PERIOD, frontdoor_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => log::error!("Front door stopped with error: {}", e),
        Ok(Err(e)) => log::error!("Front door task failed: {}", e),
        Err(_) => log::warn!("Front door did not drain within {:?}", GRACE_PERIOD),
    }

    // Runners finish the cycle in flight, then stop
    for handle in task_handles {
        match handle.await {
            Ok(cycles) => log::info!("Task runner stopped after {} cycles.", cycles),
            Err(e) => log::error!("Task runner failed: {}", e),
        }
    }

    log::info!("Shutdown complete.");
    Ok(())
}
