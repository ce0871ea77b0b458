// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Distribution inventory synchronization.
//!
//! Two sources describe the distributions on a machine, and neither tells
//! the whole story:
//!
//! 1. The __live-state channel__ (`wsl.exe --list --running`) knows which
//!    names are running right now, but nothing about how they are
//!    registered.
//! 2. The __registration store__ knows every registered distribution, its
//!    key, version, and whether it is the default, but nothing about run
//!    state.
//!
//! The [`Synchronizer`] queries both, tolerating the ways each of them
//! fails, and joins them by name. It also drives lifecycle directives
//! (terminate, unregister, launch, install) through the same executable
//! family.
//!
//! # Failure Tolerance
//!
//! - Listing running names accepts a failure status so long as there is
//!   output to parse. Only failure with no output at all is reported as
//!   [`InventoryError::ChannelUnavailable`].
//! - Listing registrations never fails. A missing or unreadable root means
//!   nothing is registered, and single registrations that cannot be opened,
//!   or that have no name, are skipped.
//! - Terminate and unregister are strict: they must exit cleanly __and__
//!   print a confirmation, or [`InventoryError::OperationFailed`] is
//!   reported.
//! - Launch and install are fire-and-forget. Only failure to start the
//!   process is reported, as [`InventoryError::Spawn`].
//!
//! # Logging
//!
//! The synchronizer does not log to whatever dispatcher happens to be
//! global when an operation runs. It holds its own [`Dispatch`], captured
//! at construction or handed over through [`Synchronizer::with_dispatch`],
//! and scopes every operation to it.

pub mod entity;
pub mod running;

pub use entity::{FormatVersion, Inventory, InventoryEntry, RegisteredEntity};
pub use running::{parse_running_names, OutputClass};

use crate::{
    channel::{CommandChannel, SystemChannel},
    config::{ArgTemplate, SyncConfig},
    package::{AppxPackageProbe, PackagePresence},
    store::{reg::RegQueryStore, RegistrationStore},
};

use std::collections::HashSet;
use tracing::{debug, dispatcher, info, instrument, warn, Dispatch, instrument::WithSubscriber};

/// Reconcile live state and registrations of distributions.
#[derive(Debug)]
pub struct Synchronizer<S = RegQueryStore, C = SystemChannel, P = AppxPackageProbe>
where
    S: RegistrationStore,
    C: CommandChannel,
    P: PackagePresence,
{
    store: S,
    channel: C,
    packages: P,
    config: SyncConfig,
    dispatch: Dispatch,
}

impl Synchronizer {
    /// Construct synchronizer that talks to the real system.
    ///
    /// Every collaborator shares one [`SystemChannel`] bounded by the
    /// configured command timeout.
    pub fn system(config: SyncConfig) -> Self {
        let channel = SystemChannel::new(config.command_timeout());
        let store = RegQueryStore::new(channel.clone(), config.registry.root.clone());
        let packages = AppxPackageProbe::new(channel.clone());

        Self::new(store, channel, packages, config)
    }
}

impl<S, C, P> Synchronizer<S, C, P>
where
    S: RegistrationStore,
    C: CommandChannel,
    P: PackagePresence,
{
    /// Construct new synchronizer.
    ///
    /// Logs to the dispatcher that is current at construction, unless
    /// replaced through [`Synchronizer::with_dispatch`].
    pub fn new(store: S, channel: C, packages: P, config: SyncConfig) -> Self {
        Self {
            store,
            channel,
            packages,
            config,
            dispatch: dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Replace logging sink.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// List names of running distributions.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::ChannelUnavailable`] if the live-state
    ///   channel cannot be run, or fails without printing anything.
    pub async fn list_running_names(&self) -> Result<HashSet<String>> {
        self.running_names()
            .with_subscriber(self.dispatch.clone())
            .await
    }

    /// Check if distribution is running.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::ChannelUnavailable`] under the same
    ///   conditions as [`Synchronizer::list_running_names`].
    pub async fn is_running(&self, name: &str) -> Result<bool> {
        Ok(self.list_running_names().await?.contains(name))
    }

    /// List registered distributions in store enumeration order.
    pub async fn list_registered(&self) -> Vec<RegisteredEntity> {
        self.registered()
            .with_subscriber(self.dispatch.clone())
            .await
    }

    /// Join running names with registrations.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::ChannelUnavailable`] if running names
    ///   cannot be listed.
    pub async fn snapshot(&self) -> Result<Inventory> {
        let running = self.list_running_names().await?;
        let registered = self.list_registered().await;

        Ok(Inventory::merge(registered, &running))
    }

    /// Unregister distribution, deleting its file system.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::OperationFailed`] unless `wsl.exe` exits
    ///   cleanly and prints a confirmation.
    pub async fn unregister(&self, name: &str) -> Result<()> {
        self.confirmed_directive(&self.config.commands.unregister_args, name)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    /// Terminate running distribution.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::OperationFailed`] unless `wsl.exe` exits
    ///   cleanly and prints a confirmation.
    pub async fn terminate(&self, name: &str) -> Result<()> {
        self.confirmed_directive(&self.config.commands.terminate_args, name)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    /// Open interactive session in distribution.
    ///
    /// Uses the terminal with target profile when both the terminal is
    /// installed and a non-empty profile hint is given. Does not wait for
    /// the session, nor check that the distribution came up.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::Spawn`] if the session cannot be started.
    pub async fn launch(&self, name: &str, profile_hint: Option<&str>) -> Result<()> {
        self.detached_directive(name, Directive::Launch { profile_hint })
            .with_subscriber(self.dispatch.clone())
            .await
    }

    /// Install distribution from the online catalog.
    ///
    /// Does not wait for installation to finish.
    ///
    /// # Errors
    ///
    /// - Return [`InventoryError::Spawn`] if the installer cannot be started.
    pub async fn install(&self, name: &str) -> Result<()> {
        self.detached_directive(name, Directive::Install)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn running_names(&self) -> Result<HashSet<String>> {
        let commands = &self.config.commands;
        let args = commands.list_running_args.render("", None);
        let output = self
            .channel
            .run_captured(&commands.wsl_executable, &args)
            .await
            .map_err(|error| InventoryError::ChannelUnavailable {
                detail: error.to_string(),
            })?;

        // INVARIANT: Failure status alone is expected when nothing runs; only silence is fatal.
        match OutputClass::of(&output) {
            OutputClass::Failed => {
                return Err(InventoryError::ChannelUnavailable {
                    detail: output.to_string(),
                })
            }
            OutputClass::Degraded => {
                debug!("listing exited with failure, parsing anyway: {output}")
            }
            OutputClass::Confirmed | OutputClass::Unconfirmed => {}
        }

        let names = parse_running_names(&output.stdout);
        debug!("{} distribution(s) running", names.len());

        Ok(names)
    }

    #[instrument(skip(self), level = "debug")]
    async fn registered(&self) -> Vec<RegisteredEntity> {
        let root = match self.store.open_root().await {
            Ok(Some(root)) => root,
            Ok(None) => {
                debug!("registration root does not exist");
                return Vec::new();
            }
            Err(error) => {
                warn!("registration root cannot be read: {error}");
                return Vec::new();
            }
        };

        let settings = &self.config.registry;
        let default_pointer = root.read_string(&settings.default_value).unwrap_or_default();

        let mut entities = Vec::new();
        for subkey in root.subkeys() {
            let node = match self.store.open_child(&root, subkey).await {
                Ok(node) => node,
                Err(error) => {
                    warn!("skip registration {subkey:?}: {error}");
                    continue;
                }
            };

            match RegisteredEntity::from_store_key(&node, &default_pointer, settings) {
                Some(entity) => entities.push(entity),
                None => debug!("skip registration {subkey:?} without a name"),
            }
        }

        entities
    }

    #[instrument(skip(self, template), level = "debug")]
    async fn confirmed_directive(&self, template: &ArgTemplate, name: &str) -> Result<()> {
        let args = template.render(name, None);
        let output = self
            .channel
            .run_captured(&self.config.commands.wsl_executable, &args)
            .await
            .map_err(|error| InventoryError::OperationFailed {
                name: name.to_owned(),
                detail: error.to_string(),
            })?;

        let class = OutputClass::of(&output);
        if class != OutputClass::Confirmed {
            warn!("directive {args:?} was not confirmed ({class:?})");
            return Err(InventoryError::OperationFailed {
                name: name.to_owned(),
                detail: output.to_string(),
            });
        }

        info!("{}", output.stdout.trim_end());

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn detached_directive(&self, name: &str, directive: Directive<'_>) -> Result<()> {
        let launch = &self.config.launch;
        let terminal = self
            .packages
            .is_installed(&launch.terminal_package_family)
            .await;

        let (program, args) = match (terminal, directive) {
            (true, Directive::Launch { profile_hint }) => {
                match profile_hint.filter(|profile| !profile.is_empty()) {
                    Some(profile) => (
                        &launch.terminal_executable,
                        launch.terminal_profile_args.render(name, Some(profile)),
                    ),
                    None => (
                        &launch.terminal_executable,
                        launch.terminal_args.render(name, None),
                    ),
                }
            }
            (true, Directive::Install) => (
                &launch.terminal_executable,
                launch.terminal_install_args.render(name, None),
            ),
            (false, Directive::Launch { .. }) => (
                &launch.fallback_executable,
                launch.fallback_args.render(name, None),
            ),
            (false, Directive::Install) => (
                &launch.fallback_executable,
                launch.fallback_install_args.render(name, None),
            ),
        };

        info!("start {program} {}", args.join(" "));
        self.channel.spawn_detached(program, &args)?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Directive<'a> {
    Launch { profile_hint: Option<&'a str> },
    Install,
}

/// All possible error types for inventory synchronization.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// Live-state channel could not produce anything usable.
    #[error("cannot list running distributions: {detail}")]
    ChannelUnavailable { detail: String },

    /// Directive did not confirm success.
    #[error("directive for distribution {name:?} was not confirmed: {detail}")]
    OperationFailed { name: String, detail: String },

    /// Detached process could not be started.
    #[error(transparent)]
    Spawn(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = InventoryError> = std::result::Result<T, E>;
