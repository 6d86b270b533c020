//! # standby-platform
//!
//! Client boundary for a remote virtualization platform.
//!
//! This crate defines the types and the [`PlatformClient`] trait that
//! the standby orchestration layer (`standby-core`) uses to talk to
//! the platform: locating virtual machines, reading property
//! snapshots, submitting clone/relocate tasks, pushing guest
//! customization, and driving power state.
//!
//! The trait is intentionally an opaque RPC surface. Every call either
//! returns a structured result, a long-running [`TaskHandle`] that can
//! be polled to completion, or a typed [`PlatformError`]. Nothing in
//! this crate caches: each [`PlatformClient::properties`] call
//! produces a fresh [`VmProperties`] snapshot.

mod client;
mod error;
mod path;
mod types;

pub use client::{PlatformClient, TaskHandle, TaskStatus};
pub use error::{PlatformError, Result};
pub use path::DatastorePath;
pub use types::{
    CloneDiskSpec, CloneSpec, CustomizationNicSetting, CustomizationSpec, CustomizationStatus,
    DatastoreSummary, GuestInfo, GuestIpAddress, GuestNic, GuestRoute, ManagedObjectRef, OsFamily,
    PowerState, RelocateSpec, ToolsStatus, VmConfigInfo, VmHandle, VmProperties, VmRuntimeInfo,
};
