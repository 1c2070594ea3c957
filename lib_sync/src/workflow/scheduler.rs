//! Fixed-interval runner for sync tasks.
//!
//! Each task gets its own tokio task: the first cycle starts immediately,
//! and the next one starts `every` after the previous cycle returned, so
//! two cycles of the same task never overlap. A shutdown signal stops the
//! runner from re-arming; it never interrupts a cycle already running.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::errors::SyncError;
use crate::workflow::tasks::CycleReport;

/// One recurring unit of work.
#[async_trait]
pub trait CycleTask: Send {
    fn name(&self) -> &'static str;
    async fn run_cycle(&mut self) -> Result<CycleReport, SyncError>;
}

/// Runs `task` until `shutdown` fires. Returns the number of cycles run.
pub async fn run_task<T: CycleTask>(
    mut task: T,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> u64 {
    let name = task.name();
    let mut cycles = 0u64;
    log::info!("[{}] Scheduled every {:?}", name, every);

    loop {
        cycles += 1;
        match task.run_cycle().await {
            Ok(report) => log::info!("[{}] Cycle {} done. {}", name, cycles, report),
            Err(e) => log::error!("[{}] Cycle {} failed: {}", name, cycles, e),
        }

        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("[{}] Received shutdown signal after {} cycles.", name, cycles);
                break;
            }
            _ = tokio::time::sleep(every) => {}
        }
    }
    cycles
}

pub fn spawn_task<T: CycleTask + 'static>(
    task: T,
    every: Duration,
    shutdown: broadcast::Receiver<()>,
) -> JoinHandle<u64> {
    tokio::spawn(run_task(task, every, shutdown))
}
