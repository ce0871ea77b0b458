// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify which executables, arguments, and registry names wslsync uses to
//! talk to the subsystem. Every field has a default that matches a stock
//! Windows install, so an empty configuration file is a valid one.
//!
//! # Argument Templates
//!
//! Directives are written as argument lists where `{name}` is replaced with
//! the distribution name and `{profile}` with the terminal profile hint:
//!
//! ```toml
//! [commands]
//! terminate_args = ["--terminate", "{name}"]
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Full synchronizer configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Live-state and mutation channel settings.
    pub commands: CommandSettings,

    /// Registration store layout.
    pub registry: RegistrySettings,

    /// Executable selection for launch and install.
    pub launch: LaunchSettings,
}

impl SyncConfig {
    /// Load configuration file, falling back to defaults if it is missing.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadConfig`] if the file exists but cannot be
    ///   read.
    /// - Return [`ConfigError::Deserialize`] if the file is not valid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match read_to_string(path.as_ref()) {
            Ok(data) => data.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::ReadConfig {
                source: err,
                path: path.as_ref().to_path_buf(),
            }),
        }
    }

    /// Deadline for every captured external command.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.commands.timeout_secs)
    }
}

impl FromStr for SyncConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: SyncConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every executable field.
        for executable in [
            &mut config.commands.wsl_executable,
            &mut config.launch.terminal_executable,
            &mut config.launch.fallback_executable,
        ] {
            *executable = shellexpand::full(executable.as_str())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned();
        }

        Ok(config)
    }
}

impl Display for SyncConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Settings for the `wsl.exe` channel.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Executable that lists, terminates, and unregisters distributions.
    pub wsl_executable: String,

    /// Arguments that list running distributions.
    pub list_running_args: ArgTemplate,

    /// Arguments that unregister a distribution.
    pub unregister_args: ArgTemplate,

    /// Arguments that terminate a distribution.
    pub terminate_args: ArgTemplate,

    /// Seconds to wait on any captured command before giving up.
    pub timeout_secs: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            wsl_executable: "wsl.exe".into(),
            list_running_args: ArgTemplate::new(["--list", "--running"]),
            unregister_args: ArgTemplate::new(["--unregister", "{name}"]),
            terminate_args: ArgTemplate::new(["--terminate", "{name}"]),
            timeout_secs: 30,
        }
    }
}

/// Layout of the registration store.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Key holding one subkey per registered distribution.
    pub root: String,

    /// String value at the root naming the default distribution's key.
    pub default_value: String,

    /// String value holding a distribution's name.
    pub name_value: String,

    /// DWORD value holding a distribution's format version.
    pub version_value: String,

    /// Version value that marks a version 2 distribution.
    pub version2_sentinel: u32,

    /// String value holding a distribution's package family name.
    pub package_value: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            root: r"HKCU\Software\Microsoft\Windows\CurrentVersion\Lxss".into(),
            default_value: "DefaultDistribution".into(),
            name_value: "DistributionName".into(),
            version_value: "Version".into(),
            version2_sentinel: 2,
            package_value: "PackageFamilyName".into(),
        }
    }
}

/// Executable selection for interactive sessions.
///
/// Windows Terminal is preferred when its package is installed. Otherwise
/// the classic console host is used.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LaunchSettings {
    /// Package family whose presence selects the terminal executable.
    pub terminal_package_family: String,

    /// Terminal executable.
    pub terminal_executable: String,

    /// Fallback executable when the terminal is not installed.
    pub fallback_executable: String,

    /// Terminal arguments when a profile hint is known.
    pub terminal_profile_args: ArgTemplate,

    /// Terminal arguments without a profile hint.
    pub terminal_args: ArgTemplate,

    /// Fallback executable arguments.
    pub fallback_args: ArgTemplate,

    /// Terminal arguments to install a distribution.
    pub terminal_install_args: ArgTemplate,

    /// Fallback executable arguments to install a distribution.
    pub fallback_install_args: ArgTemplate,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            terminal_package_family: "Microsoft.WindowsTerminal_8wekyb3d8bbwe".into(),
            terminal_executable: "wt.exe".into(),
            fallback_executable: "cmd.exe".into(),
            terminal_profile_args: ArgTemplate::new([
                "--profile",
                "{profile}",
                "--",
                "wsl.exe",
                "--distribution",
                "{name}",
            ]),
            terminal_args: ArgTemplate::new(["wsl.exe", "--distribution", "{name}"]),
            fallback_args: ArgTemplate::new(["/c", "start", "wsl.exe", "--distribution", "{name}"]),
            terminal_install_args: ArgTemplate::new([
                "wsl.exe",
                "--install",
                "--distribution",
                "{name}",
            ]),
            fallback_install_args: ArgTemplate::new([
                "/c",
                "start",
                "wsl.exe",
                "--install",
                "--distribution",
                "{name}",
            ]),
        }
    }
}

/// Argument list with `{name}` and `{profile}` placeholders.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ArgTemplate(Vec<String>);

impl ArgTemplate {
    /// Construct new argument template.
    pub fn new(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(args.into_iter().map(Into::into).collect())
    }

    /// Substitute placeholders to produce concrete arguments.
    ///
    /// A missing profile substitutes as an empty string.
    pub fn render(&self, name: &str, profile: Option<&str>) -> Vec<String> {
        self.0
            .iter()
            .map(|arg| {
                arg.replace("{name}", name)
                    .replace("{profile}", profile.unwrap_or_default())
            })
            .collect()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file exists but cannot be read.
    #[error("failed to read configuration at {:?}", path.display())]
    ReadConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("WSL_TOOLS", "/opt/wsl")])]
    fn deserialize_sync_config() -> anyhow::Result<()> {
        let result: SyncConfig = r#"
            [commands]
            wsl_executable = "$WSL_TOOLS/wsl.exe"
            timeout_secs = 5

            [registry]
            version2_sentinel = 3

            [launch]
            fallback_args = ["-c", "wsl -d {name}"]
        "#
        .parse()?;

        let mut expect = SyncConfig::default();
        expect.commands.wsl_executable = "/opt/wsl/wsl.exe".into();
        expect.commands.timeout_secs = 5;
        expect.registry.version2_sentinel = 3;
        expect.launch.fallback_args = ArgTemplate::new(["-c", "wsl -d {name}"]);

        assert_eq!(result, expect);
        assert_eq!(result.command_timeout(), Duration::from_secs(5));

        Ok(())
    }

    #[test]
    fn empty_config_is_default() -> anyhow::Result<()> {
        let result: SyncConfig = "".parse()?;
        assert_eq!(result, SyncConfig::default());

        Ok(())
    }

    #[test]
    fn serialized_config_parses_back() -> anyhow::Result<()> {
        let mut config = SyncConfig::default();
        config.launch.terminal_executable = r"C:\Tools\wt.exe".into();
        let text = config.to_string();

        assert!(text.starts_with("[commands]\n"), "unexpected layout:\n{text}");
        assert_eq!(text.parse::<SyncConfig>()?, config);

        Ok(())
    }

    #[test]
    fn partial_registry_table_keeps_defaults() -> anyhow::Result<()> {
        let result: SyncConfig = indoc! {r#"
            [registry]
            root = 'HKCU\Software\Custom\Lxss'
        "#}
        .parse()?;

        assert_eq!(result.registry.root, r"HKCU\Software\Custom\Lxss");
        assert_eq!(result.registry.name_value, "DistributionName");
        assert_eq!(result.launch, LaunchSettings::default());

        Ok(())
    }

    #[test]
    fn render_arg_template() {
        let template = ArgTemplate::new(["--profile", "{profile}", "--", "wsl.exe", "-d={name}"]);

        assert_eq!(
            template.render("Ubuntu", Some("Ubuntu Dev")),
            vec!["--profile", "Ubuntu Dev", "--", "wsl.exe", "-d=Ubuntu"]
        );
        assert_eq!(
            template.render("Debian", None),
            vec!["--profile", "", "--", "wsl.exe", "-d=Debian"]
        );
    }
}
