// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconcile running and registered WSL distributions.
//!
//! Windows Subsystem for Linux spreads what it knows about distributions
//! across two places: `wsl.exe`, which can list what is running, and the
//! per-user registry, which records everything that is registered. Wslsync
//! queries both, copes with the quirks of each, and joins them into one
//! [`Inventory`]. It also drives the lifecycle of a distribution: terminate,
//! unregister, launch, and install.
//!
//! Each external dependency sits behind a trait so it can be replaced:
//!
//! - [`CommandChannel`](channel::CommandChannel) creates processes.
//! - [`RegistrationStore`](store::RegistrationStore) reads registrations.
//! - [`PackagePresence`](package::PackagePresence) checks installed
//!   packages.

pub mod channel;
pub mod config;
pub mod inventory;
pub mod package;
pub mod path;
pub mod store;

pub use inventory::{
    FormatVersion, Inventory, InventoryEntry, InventoryError, RegisteredEntity, Synchronizer,
};
