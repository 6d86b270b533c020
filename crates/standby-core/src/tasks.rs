//! Bounded polling for long-running platform tasks.

use std::time::Duration;

use standby_platform::{ManagedObjectRef, PlatformClient, PlatformError, TaskHandle, TaskStatus};
use tokio::time::{sleep, Instant};

use crate::error::{err_stage, LifecycleError, Result};

/// Interval between task status polls.
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll a task to completion, bounded by `timeout`.
///
/// Returns the task result reference (the new VM for clone tasks).
/// A task error payload becomes a `Platform` error carrying the
/// stage; exceeding the timeout is a distinct `Timeout` so callers
/// can reason about tasks that may still land asynchronously.
pub(crate) async fn wait_for_task(
    client: &dyn PlatformClient,
    task: &TaskHandle,
    timeout: Duration,
    stage: &'static str,
) -> Result<Option<ManagedObjectRef>> {
    let start = Instant::now();
    loop {
        match client.task_status(task).await.map_err(err_stage(stage))? {
            TaskStatus::Running => {}
            TaskStatus::Success(result) => {
                tracing::debug!(
                    task = %task,
                    stage,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Task complete"
                );
                return Ok(result);
            }
            TaskStatus::Error(message) => {
                return Err(LifecycleError::Platform {
                    stage,
                    source: PlatformError::TaskFailed {
                        task: task.0.clone(),
                        message,
                    },
                });
            }
        }
        if start.elapsed() >= timeout {
            tracing::warn!(task = %task, stage, timeout_s = timeout.as_secs(), "Task wait timed out");
            return Err(LifecycleError::Timeout {
                stage,
                elapsed: start.elapsed(),
            });
        }
        sleep(TASK_POLL_INTERVAL).await;
    }
}
