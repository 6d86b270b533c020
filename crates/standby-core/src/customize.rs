//! Guest customization: spec derivation and completion waiter.

use std::sync::Arc;
use std::time::Duration;

use standby_platform::{
    CustomizationSpec, CustomizationStatus, OsFamily, PlatformClient, PlatformError, VmHandle,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::config::CustomizeBlock;

/// Interval between customization event polls.
const EVENT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Terminal outcome of a customization wait.
#[derive(Debug, Clone)]
pub enum CustomizationOutcome {
    /// The guest reported successful customization.
    Succeeded,
    /// The guest reported a customization failure.
    Failed(String),
    /// No terminal event arrived within the wait timeout.
    TimedOut(Duration),
    /// Polling the platform failed; the guest's own result is
    /// unknown.
    Platform(PlatformError),
}

/// Derive the one-shot customization spec for a guest OS family.
pub fn build_customization_spec(block: &CustomizeBlock, family: OsFamily) -> CustomizationSpec {
    CustomizationSpec {
        family,
        host_name: block.host_name.clone(),
        domain: block.domain.clone(),
        dns_servers: block.dns_servers.clone(),
        nic_settings: block.nic_settings.clone(),
    }
}

/// Observes guest-customization completion after a spec has been
/// pushed into the guest.
///
/// Spawning the waiter starts a background task that polls the
/// platform's customization events scoped to the VM. Exactly one
/// terminal outcome is delivered per invocation; re-reading after
/// delivery returns the same result and never blocks again.
///
/// Abandoning the waiter stops the local polling, but the in-flight
/// guest operation on the platform is not cancelled.
pub struct CustomizationWaiter {
    rx: watch::Receiver<Option<CustomizationOutcome>>,
    task: JoinHandle<()>,
}

impl CustomizationWaiter {
    /// Start observing. Call this before pushing the spec so no
    /// terminal event can slip past the waiter.
    pub fn spawn(client: Arc<dyn PlatformClient>, vm: VmHandle, timeout: Duration) -> Self {
        let (tx, rx) = watch::channel(None);
        let task = tokio::spawn(async move {
            let start = Instant::now();
            let outcome = loop {
                match client.customization_status(&vm).await {
                    Ok(CustomizationStatus::Pending) => {}
                    Ok(CustomizationStatus::Succeeded) => break CustomizationOutcome::Succeeded,
                    Ok(CustomizationStatus::Failed(message)) => {
                        break CustomizationOutcome::Failed(message)
                    }
                    Err(e) => break CustomizationOutcome::Platform(e),
                }
                if start.elapsed() >= timeout {
                    break CustomizationOutcome::TimedOut(timeout);
                }
                sleep(EVENT_POLL_INTERVAL).await;
            };
            tracing::debug!(vm = %vm.moref, ?outcome, "Customization wait finished");
            let _ = tx.send(Some(outcome));
        });
        Self { rx, task }
    }

    /// Non-blocking check for a terminal outcome.
    pub fn poll_done(&self) -> Option<CustomizationOutcome> {
        self.rx.borrow().clone()
    }

    /// Block until the terminal outcome is delivered. Idempotent
    /// after delivery.
    pub async fn wait(&mut self) -> CustomizationOutcome {
        match self.rx.wait_for(|v| v.is_some()).await {
            Ok(value) => match value.clone() {
                Some(outcome) => outcome,
                None => CustomizationOutcome::Failed("waiter delivered no outcome".into()),
            },
            Err(_) => CustomizationOutcome::Failed("customization waiter was cancelled".into()),
        }
    }

    /// Stop observing without waiting for an outcome.
    pub fn abandon(self) {
        self.task.abort();
    }
}

impl Drop for CustomizationWaiter {
    fn drop(&mut self) {
        self.task.abort();
    }
}
