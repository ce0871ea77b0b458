// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package presence checks.
//!
//! Launch and install pick their executable based on whether a package
//! (Windows Terminal, by default) is installed for the current user.

use crate::channel::{CommandChannel, SystemChannel};

use std::{collections::HashSet, future::Future};
use tracing::{debug, instrument, warn};

/// Answer whether a package family is installed.
pub trait PackagePresence: Send + Sync {
    /// Check if package family is installed. Failure to tell counts as no.
    fn is_installed(&self, family: &str) -> impl Future<Output = bool> + Send;
}

/// Package presence through PowerShell's `Get-AppxPackage`.
#[derive(Debug, Clone, Default)]
pub struct AppxPackageProbe<C = SystemChannel>
where
    C: CommandChannel,
{
    channel: C,
}

impl<C> AppxPackageProbe<C>
where
    C: CommandChannel,
{
    /// Construct new package probe.
    pub fn new(channel: C) -> Self {
        Self { channel }
    }
}

impl<C> PackagePresence for AppxPackageProbe<C>
where
    C: CommandChannel,
{
    #[instrument(skip(self), level = "debug")]
    async fn is_installed(&self, family: &str) -> bool {
        let script = format!(
            "Get-AppxPackage | Where-Object {{ $_.PackageFamilyName -eq '{}' }} | \
             Select-Object -ExpandProperty PackageFamilyName",
            family.replace('\'', "''")
        );
        let args = ["-NoProfile", "-NonInteractive", "-Command", script.as_str()]
            .map(String::from);

        let output = match self.channel.run_captured("powershell.exe", &args).await {
            Ok(output) => output,
            Err(error) => {
                warn!("cannot determine if {family} is installed: {error}");
                return false;
            }
        };

        if !output.exited_successfully() {
            warn!("cannot determine if {family} is installed: {output}");
            return false;
        }

        let installed = output
            .stdout
            .lines()
            .any(|line| line.trim().eq_ignore_ascii_case(family));
        debug!("package {family} installed: {installed}");

        installed
    }
}

/// Fixed set of installed package families.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledPackages(HashSet<String>);

impl InstalledPackages {
    /// Construct new fixed package set.
    pub fn new(families: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(
            families
                .into_iter()
                .map(|family| family.into().to_ascii_lowercase())
                .collect(),
        )
    }
}

impl PackagePresence for InstalledPackages {
    async fn is_installed(&self, family: &str) -> bool {
        self.0.contains(&family.to_ascii_lowercase())
    }
}
