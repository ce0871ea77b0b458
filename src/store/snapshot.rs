// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Registration store backed by a TOML snapshot.
//!
//! Useful on hosts without a registry, and for reproducing a user's store
//! layout without touching a real one. A snapshot looks like this:
//!
//! ```toml
//! [root]
//! path = 'HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Lxss'
//! values = { DefaultDistribution = "{a2c6}" }
//!
//! [[root.child]]
//! key = "{a2c6}"
//! values = { DistributionName = "Ubuntu", Version = 2 }
//!
//! [[root.child]]
//! key = "{5f1e}"
//! unreadable = true
//! ```
//!
//! Children marked `unreadable` refuse to open, which mimics a key whose
//! access control list locks the current user out.

use crate::store::{RegistrationStore, Result, StoreError, StoreKey, StoreValue};

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::read_to_string, path::Path, str::FromStr};

/// Registration store held entirely in memory.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SnapshotStore {
    /// Registration root, absent if nothing was ever registered.
    pub root: Option<SnapshotRoot>,
}

impl SnapshotStore {
    /// Load snapshot from file.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ReadSnapshot`] if file cannot be read.
    /// - Return [`StoreError::Deserialize`] if file is malformed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        read_to_string(path.as_ref())
            .map_err(|err| StoreError::ReadSnapshot {
                source: err,
                path: path.as_ref().to_path_buf(),
            })?
            .parse()
    }
}

impl FromStr for SnapshotStore {
    type Err = StoreError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(toml::de::from_str(data)?)
    }
}

/// Registration root of a snapshot.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SnapshotRoot {
    /// Full key path of root.
    #[serde(default = "default_root_path")]
    pub path: String,

    /// Values held directly by root.
    #[serde(default)]
    pub values: BTreeMap<String, StoreValue>,

    /// Registrations in enumeration order.
    #[serde(default, rename = "child")]
    pub children: Vec<SnapshotChild>,
}

/// One registration of a snapshot.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SnapshotChild {
    /// Final path component of registration key.
    pub key: String,

    /// Values held by registration.
    #[serde(default)]
    pub values: BTreeMap<String, StoreValue>,

    /// Refuse to open this registration.
    #[serde(default)]
    pub unreadable: bool,
}

fn default_root_path() -> String {
    r"HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Lxss".into()
}

impl RegistrationStore for SnapshotStore {
    async fn open_root(&self) -> Result<Option<StoreKey>> {
        Ok(self.root.as_ref().map(|root| StoreKey {
            path: root.path.clone(),
            values: root
                .values
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            subkeys: root.children.iter().map(|child| child.key.clone()).collect(),
        }))
    }

    async fn open_child(&self, root: &StoreKey, name: &str) -> Result<StoreKey> {
        let path = format!("{}\\{name}", root.path());
        let child = self
            .root
            .iter()
            .flat_map(|root| root.children.iter())
            .find(|child| child.key.eq_ignore_ascii_case(name))
            .ok_or_else(|| StoreError::MissingKey { path: path.clone() })?;

        if child.unreadable {
            return Err(StoreError::AccessDenied { path });
        }

        Ok(StoreKey {
            path,
            values: child
                .values
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            subkeys: Vec::new(),
        })
    }
}
