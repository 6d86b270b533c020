//! # standby-core
//!
//! Lifecycle orchestration for standby virtual machines on a remote
//! virtualization platform: locating an existing machine, cloning one
//! from a source, applying guest customization, powering on, waiting
//! for guest networking, migrating between datastores/hosts, and
//! tearing down — with rollback on partial failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   LifecycleController                      │
//! │  create_standby() / delete() / migrate_in_place() /        │
//! │  refresh()                                                 │
//! ├────────────┬───────────────┬───────────────┬───────────────┤
//! │ VmLocator  │ CloneOrchestr.│ MigrationOrch.│ GuestNetWaiter│
//! │ uuid/moref │ folder + spec │ relocate +    │ ip wait +     │
//! │ → handle + │ + task wait   │ verify reads  │ routable wait │
//! │   snapshot │               │               │               │
//! ├────────────┴───────────────┴───────────────┴───────────────┤
//! │              CustomizationWaiter (spawned task)            │
//! ├────────────────────────────────────────────────────────────┤
//! │        PlatformClient (standby-platform, RPC surface)      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The controller owns its collaborators explicitly and is the only
//! layer that decides error recoverability. One logical operation
//! runs per managed VM at a time; only the customization waiter
//! spawns a background task, delivering exactly one terminal outcome
//! over a single-value channel.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use standby_core::{
//!     CloneBlock, CreationSource, DatastorePlacement, LifecycleController,
//!     LifecycleRecord, StandbyConfig,
//! };
//! use standby_platform::ManagedObjectRef;
//!
//! # async fn example(client: Arc<dyn standby_platform::PlatformClient>) -> standby_core::Result<()> {
//! let controller = LifecycleController::new(client);
//!
//! let mut config = StandbyConfig::new(
//!     ManagedObjectRef::new("resgroup-42"),
//!     DatastorePlacement::Datastore(ManagedObjectRef::new("datastore-7")),
//!     CreationSource::Clone(CloneBlock::new(ManagedObjectRef::new("vm-100"))),
//! );
//! config.name = "standby-1".into();
//!
//! let mut record = LifecycleRecord::new();
//! controller.create_standby(&config, &mut record).await?;
//!
//! // ... later: relocate or tear down using the same record
//! controller.delete(&config, &mut record).await?;
//! # Ok(())
//! # }
//! ```

mod clone;
mod config;
mod controller;
mod customize;
mod error;
mod locator;
mod migrate;
mod netwait;
mod record;
mod tasks;

#[cfg(test)]
pub(crate) mod testsupport;

pub use clone::CloneOrchestrator;
pub use config::{
    CloneBlock, CreationSource, CustomizeBlock, DatastorePlacement, DiskInput, MigrateConfig,
    NetworkInterfaceInput, StandbyConfig,
};
pub use controller::LifecycleController;
pub use customize::{build_customization_spec, CustomizationOutcome, CustomizationWaiter};
pub use error::{LifecycleError, Result};
pub use locator::VmLocator;
pub use migrate::MigrationOrchestrator;
pub use netwait::{AddressFilter, GuestNetWaiter};
pub use record::LifecycleRecord;
