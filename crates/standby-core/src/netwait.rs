//! Waiting for guest networking.
//!
//! Two bounded waits, composed in sequence by the lifecycle
//! controller: first for any acceptable guest IP, then (when the
//! routable flag is set) for an address with a discoverable default
//! gateway on its subnet. Both share the ignore-list and the desired
//! address filter. The guest may briefly report a stale DHCP lease
//! after boot; when a desired address was specified, a stale read
//! must not count as success.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use standby_platform::{GuestInfo, GuestIpAddress, PlatformClient, VmHandle};
use tokio::time::{sleep, Instant};

use crate::config::minutes;
use crate::error::{err_stage, LifecycleError, Result};

/// Interval between guest-info polls.
const GUEST_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Filters applied to every candidate guest address.
#[derive(Debug, Clone, Default)]
pub struct AddressFilter {
    /// Addresses that never count as a result.
    pub ignored: Vec<IpAddr>,
    /// When set, only this address satisfies the wait.
    pub desired: Option<IpAddr>,
}

impl AddressFilter {
    /// Filter with an ignore-list and no desired address.
    pub fn ignoring(ignored: Vec<IpAddr>) -> Self {
        Self {
            ignored,
            desired: None,
        }
    }
}

/// Polls guest properties until an address satisfying policy appears.
#[derive(Clone)]
pub struct GuestNetWaiter {
    client: Arc<dyn PlatformClient>,
}

impl GuestNetWaiter {
    /// Waiter over the given platform client.
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    /// Wait for any acceptable guest IP.
    ///
    /// `timeout_minutes <= 0` disables the wait: returns `Ok(None)`
    /// immediately regardless of guest state. Exceeding the timeout
    /// is an error, never silent success.
    pub async fn wait_for_ip(
        &self,
        vm: &VmHandle,
        timeout_minutes: i64,
        filter: &AddressFilter,
    ) -> Result<Option<IpAddr>> {
        if timeout_minutes <= 0 {
            tracing::debug!(vm = %vm.moref, "Guest IP wait disabled");
            return Ok(None);
        }
        self.poll_guest(vm, minutes(timeout_minutes), filter, false, "guest ip")
            .await
            .map(Some)
    }

    /// Wait for a guest address, optionally requiring routability.
    ///
    /// With `routable` set, the candidate must additionally have a
    /// default gateway on its subnet; without it, the first
    /// non-ignored (and, if specified, desired) address is accepted.
    pub async fn wait_for_net(
        &self,
        vm: &VmHandle,
        routable: bool,
        timeout_minutes: i64,
        filter: &AddressFilter,
    ) -> Result<Option<IpAddr>> {
        if timeout_minutes <= 0 {
            tracing::debug!(vm = %vm.moref, "Guest network wait disabled");
            return Ok(None);
        }
        self.poll_guest(vm, minutes(timeout_minutes), filter, routable, "guest network")
            .await
            .map(Some)
    }

    async fn poll_guest(
        &self,
        vm: &VmHandle,
        timeout: Duration,
        filter: &AddressFilter,
        routable: bool,
        stage: &'static str,
    ) -> Result<IpAddr> {
        let start = Instant::now();
        loop {
            let props = self
                .client
                .properties(vm)
                .await
                .map_err(err_stage("guest property read"))?;

            if let Some(guest) = props.guest.as_ref() {
                if let Some(candidate) = select_candidate(guest, filter) {
                    if !routable || has_routable_gateway(guest, candidate) {
                        tracing::info!(
                            vm = %vm.moref,
                            ip = %candidate.addr,
                            routable,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Guest address available"
                        );
                        return Ok(candidate.addr);
                    }
                }
            }

            if start.elapsed() >= timeout {
                tracing::warn!(vm = %vm.moref, stage, timeout_s = timeout.as_secs(), "Guest wait timed out");
                return Err(LifecycleError::Timeout {
                    stage,
                    elapsed: start.elapsed(),
                });
            }
            sleep(GUEST_POLL_INTERVAL).await;
        }
    }
}

/// Pick the first acceptable address from a guest snapshot.
///
/// The ignore-list and link-local exclusion apply before the desired
/// match, so a desired address that is also ignored can never be
/// selected.
pub(crate) fn select_candidate(
    guest: &GuestInfo,
    filter: &AddressFilter,
) -> Option<GuestIpAddress> {
    guest.all_addresses().find(|a| {
        if is_link_local(a.addr) || filter.ignored.contains(&a.addr) {
            return false;
        }
        match filter.desired {
            Some(want) => a.addr == want,
            None => true,
        }
    })
}

fn has_routable_gateway(guest: &GuestInfo, candidate: GuestIpAddress) -> bool {
    guest
        .default_gateways()
        .any(|gw| same_subnet(candidate.addr, candidate.prefix_len, gw))
}

fn is_link_local(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_link_local() || v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80 || v6.is_loopback(),
    }
}

fn same_subnet(a: IpAddr, prefix_len: u8, b: IpAddr) -> bool {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u32::MAX << (32 - u32::from(prefix_len.min(32)))
            };
            (u32::from(a) & mask) == (u32::from(b) & mask)
        }
        (IpAddr::V6(a), IpAddr::V6(b)) => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u128::MAX << (128 - u32::from(prefix_len.min(128)))
            };
            (u128::from(a) & mask) == (u128::from(b) & mask)
        }
        _ => false,
    }
}
