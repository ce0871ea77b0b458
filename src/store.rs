// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Registration store access.
//!
//! WSL keeps one registry key per registered distribution under a single
//! per-user root. The root itself carries a pointer to the default
//! distribution's key:
//!
//! ```text
//! HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Lxss
//!     DefaultDistribution    REG_SZ       {a2c6...}
//!     {a2c6...}
//!         DistributionName   REG_SZ       Ubuntu
//!         Version            REG_DWORD    0x2
//!         PackageFamilyName  REG_SZ       CanonicalGroupLimited.Ubuntu_79rhkp1fndgsc
//!     {5f1e...}
//!         DistributionName   REG_SZ       Debian
//! ```
//!
//! Wslsync only ever reads this store. Each read produces a [`StoreKey`]
//! snapshot of one key: its values and the names of its immediate subkeys.
//! Values are read back through typed accessors that report whether a value
//! was present, absent, or of an unexpected type, leaving the choice of
//! fallback to the caller.

pub mod reg;
pub mod snapshot;

use crate::channel::ChannelError;

use serde::{Deserialize, Serialize};
use std::{future::Future, path::PathBuf};

/// Layer of indirection for the registration store.
pub trait RegistrationStore: Send + Sync {
    /// Open the registration root.
    ///
    /// Returns `None` if the root does not exist, which is a legitimate
    /// "nothing registered" state.
    fn open_root(&self) -> impl Future<Output = Result<Option<StoreKey>>> + Send;

    /// Open an immediate subkey of the registration root.
    fn open_child(
        &self,
        root: &StoreKey,
        name: &str,
    ) -> impl Future<Output = Result<StoreKey>> + Send;
}

/// Snapshot of one key in the registration store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreKey {
    path: String,
    values: Vec<(String, StoreValue)>,
    subkeys: Vec<String>,
}

impl StoreKey {
    /// Construct new key snapshot without values or subkeys.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Attach a value.
    pub fn with_value(mut self, name: impl Into<String>, value: StoreValue) -> Self {
        self.values.push((name.into(), value));
        self
    }

    /// Attach an immediate subkey name.
    pub fn with_subkey(mut self, name: impl Into<String>) -> Self {
        self.subkeys.push(name.into());
        self
    }

    /// Full path of key.
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Immediate subkey names in store enumeration order.
    pub fn subkeys(&self) -> &[String] {
        self.subkeys.as_slice()
    }

    /// Final backslash separated component of key path.
    pub fn identity_segment(&self) -> &str {
        self.path.rsplit('\\').next().unwrap_or_default()
    }

    /// Look up raw value. Value names are case-insensitive.
    pub fn value(&self, name: &str) -> Option<&StoreValue> {
        self.values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Read string value.
    pub fn read_string(&self, name: &str) -> ValueRead<String> {
        match self.value(name) {
            Some(StoreValue::String(value)) => ValueRead::Present(value.clone()),
            Some(_) => ValueRead::WrongType,
            None => ValueRead::Absent,
        }
    }

    /// Read 32-bit integer value.
    pub fn read_dword(&self, name: &str) -> ValueRead<u32> {
        match self.value(name) {
            Some(StoreValue::Dword(value)) => ValueRead::Present(*value),
            Some(_) => ValueRead::WrongType,
            None => ValueRead::Absent,
        }
    }
}

/// Raw value held by a key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StoreValue {
    /// String value, expandable or not.
    String(String),

    /// 32-bit integer value.
    Dword(u32),

    /// Any other value type, kept as its textual rendering.
    ///
    /// Snapshots spell it as a table, e.g. `{ kind = "REG_BINARY", data = "0A00" }`.
    Other { kind: String, data: String },
}

impl StoreValue {
    /// Construct value of some type without a typed reading.
    pub fn other(kind: impl Into<String>, data: impl Into<String>) -> Self {
        Self::Other {
            kind: kind.into(),
            data: data.into(),
        }
    }
}

/// Outcome of a typed value read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRead<T> {
    /// Value exists with expected type.
    Present(T),

    /// Value does not exist.
    Absent,

    /// Value exists, but holds some other type.
    WrongType,
}

impl<T> ValueRead<T> {
    /// Convert into [`Option`], treating wrong types as absent.
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent | Self::WrongType => None,
        }
    }

    /// Collapse to value or fallback.
    pub fn unwrap_or(self, default: T) -> T {
        self.present().unwrap_or(default)
    }

    /// Collapse to value or its type's default.
    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.present().unwrap_or_default()
    }
}

/// All possible error types for registration store access.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Key does not exist.
    #[error("registration key {path:?} does not exist")]
    MissingKey { path: String },

    /// Key exists but access to it was refused.
    #[error("access to registration key {path:?} was denied")]
    AccessDenied { path: String },

    /// Store query ran, but reported failure.
    #[error("failed to query registration key {path:?}: {detail}")]
    Query { path: String, detail: String },

    /// Store query could not be run.
    #[error("failed to query registration key {path:?}")]
    Channel {
        #[source]
        source: ChannelError,
        path: String,
    },

    /// Snapshot file cannot be read.
    #[error("failed to read store snapshot at {:?}", path.display())]
    ReadSnapshot {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Snapshot file is malformed.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
