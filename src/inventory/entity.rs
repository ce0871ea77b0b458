// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Inventory data model.
//!
//! A [`RegisteredEntity`] is what the registration store says exists. The
//! live-state channel only ever tells us names, so the two are joined by
//! name into an [`Inventory`]. Names are __not__ unique across registrations,
//! thus one running name can mark several entries as running.

use crate::{
    config::RegistrySettings,
    store::{StoreKey, ValueRead},
};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Store format generation of a registration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum FormatVersion {
    #[default]
    V1,
    V2,
}

/// Distribution known to the registration store, running or not.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegisteredEntity {
    /// Display name. Never empty.
    pub name: String,

    /// Final path component of the registration key.
    pub identity_key: String,

    /// Package family the distribution was installed from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_identity: Option<String>,

    /// Store format generation.
    pub format_version: FormatVersion,

    /// Registration is the store's default.
    pub is_default: bool,
}

impl RegisteredEntity {
    /// Build entity from a registration key.
    ///
    /// Returns `None` if the key carries no usable name. The default pointer
    /// matches the key's identity segment case-insensitively; an empty
    /// pointer matches nothing.
    pub fn from_store_key(
        key: &StoreKey,
        default_pointer: &str,
        settings: &RegistrySettings,
    ) -> Option<Self> {
        let name = key.read_string(&settings.name_value).unwrap_or_default();
        if name.is_empty() {
            return None;
        }

        let identity_key = key.identity_segment().to_owned();
        let format_version = match key.read_dword(&settings.version_value) {
            ValueRead::Present(tag) if tag == settings.version2_sentinel => FormatVersion::V2,
            _ => FormatVersion::V1,
        };
        let package_identity = key
            .read_string(&settings.package_value)
            .present()
            .filter(|family| !family.is_empty());
        let is_default =
            !default_pointer.is_empty() && identity_key.eq_ignore_ascii_case(default_pointer);

        Some(Self {
            name,
            identity_key,
            package_identity,
            format_version,
            is_default,
        })
    }
}

/// One registration joined with live state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InventoryEntry {
    /// A running distribution shares this entry's name.
    pub is_running: bool,

    /// Registration itself.
    pub entity: RegisteredEntity,
}

/// Reconciled view of registered and running distributions.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Inventory {
    /// Running names that match no registration, sorted.
    pub orphaned_running: Vec<String>,

    /// Registrations in store enumeration order.
    pub entries: Vec<InventoryEntry>,
}

impl Inventory {
    /// Join registrations with running names.
    pub fn merge(registered: Vec<RegisteredEntity>, running: &HashSet<String>) -> Self {
        let known = registered
            .iter()
            .map(|entity| entity.name.as_str())
            .collect::<HashSet<_>>();
        let mut orphaned_running = running
            .iter()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        orphaned_running.sort();

        let entries = registered
            .into_iter()
            .map(|entity| InventoryEntry {
                is_running: running.contains(&entity.name),
                entity,
            })
            .collect();

        Self {
            orphaned_running,
            entries,
        }
    }

    /// Entry for the store's default registration.
    pub fn default_entry(&self) -> Option<&InventoryEntry> {
        self.entries.iter().find(|entry| entry.entity.is_default)
    }

    /// Every entry with target name.
    pub fn find<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a InventoryEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| entry.entity.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreValue;
    use simple_test_case::test_case;

    fn key(identity: &str) -> StoreKey {
        StoreKey::new(format!(r"HKEY_CURRENT_USER\Software\Lxss\{identity}"))
    }

    fn entity(name: &str, identity_key: &str) -> RegisteredEntity {
        RegisteredEntity {
            name: name.into(),
            identity_key: identity_key.into(),
            package_identity: None,
            format_version: FormatVersion::V1,
            is_default: false,
        }
    }

    #[test]
    fn build_entity_from_store_key() {
        let node = key("{A2C6}")
            .with_value("DistributionName", StoreValue::String("Ubuntu".into()))
            .with_value("Version", StoreValue::Dword(2))
            .with_value(
                "PackageFamilyName",
                StoreValue::String("CanonicalGroupLimited.Ubuntu_79rhkp1fndgsc".into()),
            );

        let result =
            RegisteredEntity::from_store_key(&node, "{a2c6}", &RegistrySettings::default());
        let expect = RegisteredEntity {
            name: "Ubuntu".into(),
            identity_key: "{A2C6}".into(),
            package_identity: Some("CanonicalGroupLimited.Ubuntu_79rhkp1fndgsc".into()),
            format_version: FormatVersion::V2,
            is_default: true,
        };

        assert_eq!(result, Some(expect));
    }

    #[test]
    fn same_node_content_builds_equal_entities() {
        let build = || {
            let node = key("{5F1E}")
                .with_value("DistributionName", StoreValue::String("Debian".into()))
                .with_value("Version", StoreValue::Dword(1));
            RegisteredEntity::from_store_key(&node, "{A2C6}", &RegistrySettings::default())
        };

        assert_eq!(build(), build());
    }

    #[test_case(None; "missing name")]
    #[test_case(Some(StoreValue::String(String::new())); "empty name")]
    #[test_case(Some(StoreValue::Dword(7)); "name of wrong type")]
    #[test]
    fn unnamed_key_builds_nothing(name: Option<StoreValue>) {
        let mut node = key("{A2C6}");
        if let Some(name) = name {
            node = node.with_value("DistributionName", name);
        }

        assert_eq!(
            RegisteredEntity::from_store_key(&node, "", &RegistrySettings::default()),
            None
        );
    }

    #[test_case(Some(StoreValue::Dword(2)), FormatVersion::V2; "sentinel")]
    #[test_case(Some(StoreValue::Dword(1)), FormatVersion::V1; "other number")]
    #[test_case(Some(StoreValue::String("2".into())), FormatVersion::V1; "wrong type")]
    #[test_case(None, FormatVersion::V1; "absent")]
    #[test]
    fn version_tag_maps_to_format(tag: Option<StoreValue>, expect: FormatVersion) {
        let mut node =
            key("{A2C6}").with_value("DistributionName", StoreValue::String("Arch".into()));
        if let Some(tag) = tag {
            node = node.with_value("Version", tag);
        }

        let result = RegisteredEntity::from_store_key(&node, "", &RegistrySettings::default())
            .map(|entity| entity.format_version);
        assert_eq!(result, Some(expect));
    }

    #[test]
    fn empty_default_pointer_matches_nothing() {
        let node = StoreKey::new("")
            .with_value("DistributionName", StoreValue::String("Odd".into()));
        let result = RegisteredEntity::from_store_key(&node, "", &RegistrySettings::default());

        assert_eq!(result.map(|entity| entity.is_default), Some(false));
    }

    #[test]
    fn merge_marks_running_by_name() {
        let registered = vec![
            entity("Ubuntu", "{1}"),
            entity("Debian", "{2}"),
            entity("Ubuntu", "{3}"),
        ];
        let running = ["Ubuntu", "docker-desktop", "Alpine"]
            .into_iter()
            .map(String::from)
            .collect::<HashSet<_>>();

        let result = Inventory::merge(registered, &running);

        assert_eq!(
            result
                .entries
                .iter()
                .map(|entry| (entry.entity.identity_key.as_str(), entry.is_running))
                .collect::<Vec<_>>(),
            vec![("{1}", true), ("{2}", false), ("{3}", true)]
        );
        assert_eq!(result.orphaned_running, vec!["Alpine", "docker-desktop"]);
        assert_eq!(result.find("Ubuntu").count(), 2);
        assert_eq!(result.default_entry(), None);
    }
}
