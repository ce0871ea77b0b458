// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Registry access through `reg.exe`.
//!
//! `reg query <key>` prints the queried key, its values, and then its
//! immediate subkeys:
//!
//! ```text
//!
//! HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Lxss
//!     DefaultDistribution    REG_SZ    {a2c6...}
//!     DefaultVersion    REG_DWORD    0x2
//!
//! HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Lxss\{a2c6...}
//! HKEY_CURRENT_USER\Software\Microsoft\Windows\CurrentVersion\Lxss\{5f1e...}
//! ```
//!
//! Columns of a value line are separated by exactly four spaces, which keeps
//! value names and data that contain single spaces intact.

use crate::{
    channel::{CommandChannel, SystemChannel},
    store::{RegistrationStore, Result, StoreError, StoreKey, StoreValue},
};

use tracing::{debug, instrument};

const COLUMN_SEPARATOR: &str = "    ";

/// Registration store backed by `reg.exe` queries.
#[derive(Debug, Clone)]
pub struct RegQueryStore<C = SystemChannel>
where
    C: CommandChannel,
{
    channel: C,
    root_path: String,
}

impl<C> RegQueryStore<C>
where
    C: CommandChannel,
{
    /// Construct new `reg.exe` store rooted at target key path.
    pub fn new(channel: C, root_path: impl Into<String>) -> Self {
        Self {
            channel,
            root_path: root_path.into(),
        }
    }

    /// Query one key.
    ///
    /// A failed query that prints nothing to standard output means the key
    /// does not exist; `reg.exe` reports that on standard error only.
    #[instrument(skip(self), level = "debug")]
    async fn query(&self, path: &str) -> Result<Option<StoreKey>> {
        let output = self
            .channel
            .run_captured("reg", &["query".into(), path.into()])
            .await
            .map_err(|source| StoreError::Channel {
                source,
                path: path.to_owned(),
            })?;

        if !output.exited_successfully() {
            if output.stdout.trim().is_empty() {
                debug!("registry key {path:?} not found: {output}");
                return Ok(None);
            }

            return Err(StoreError::Query {
                path: path.to_owned(),
                detail: output.to_string(),
            });
        }

        Ok(Some(parse_reg_query(path, &output.stdout)))
    }
}

impl<C> RegistrationStore for RegQueryStore<C>
where
    C: CommandChannel,
{
    async fn open_root(&self) -> Result<Option<StoreKey>> {
        self.query(&self.root_path).await
    }

    async fn open_child(&self, root: &StoreKey, name: &str) -> Result<StoreKey> {
        let path = format!("{}\\{name}", root.path());
        let key = self.query(&path).await?;

        key.ok_or(StoreError::MissingKey { path })
    }
}

/// Parse output of `reg query` for a single key.
///
/// The first unindented line is taken as the key's own path; if there is
/// none, `queried` is used instead. Later unindented lines are subkeys, of
/// which only the final path component is kept.
pub fn parse_reg_query(queried: &str, text: &str) -> StoreKey {
    let mut path = None;
    let mut key = StoreKey::default();

    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        if line.starts_with(char::is_whitespace) {
            // INVARIANT: Values only belong to the queried key, never to subkeys.
            if key.subkeys.is_empty() {
                if let Some((name, value)) = parse_value_line(line) {
                    key.values.push((name, value));
                }
            }
            continue;
        }

        if path.is_none() {
            path = Some(line.trim_end().to_owned());
        } else {
            let subkey = line.trim_end().rsplit('\\').next().unwrap_or_default();
            key.subkeys.push(subkey.to_owned());
        }
    }

    key.path = path.unwrap_or_else(|| queried.to_owned());
    key
}

fn parse_value_line(line: &str) -> Option<(String, StoreValue)> {
    let mut columns = line.trim_start().splitn(3, COLUMN_SEPARATOR);
    let name = columns.next()?;
    let kind = columns.next()?;
    let data = columns.next().unwrap_or_default().trim_end();

    let value = match kind {
        "REG_SZ" | "REG_EXPAND_SZ" => StoreValue::String(data.to_owned()),
        "REG_DWORD" => match parse_dword(data) {
            Some(number) => StoreValue::Dword(number),
            None => StoreValue::other(kind, data),
        },
        _ => StoreValue::other(kind, data),
    };

    Some((name.to_owned(), value))
}

fn parse_dword(data: &str) -> Option<u32> {
    match data.strip_prefix("0x").or_else(|| data.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => data.parse().ok(),
    }
}
