// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use wslsync::{
    channel::SystemChannel,
    config::SyncConfig,
    package::AppxPackageProbe,
    path::default_config_path,
    store::{snapshot::SnapshotStore, RegistrationStore},
    FormatVersion, Inventory, Synchronizer,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{dispatcher, error, Dispatch};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "wslsync [options] <wslsync-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Configuration file to use instead of the default one.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Read registrations from a TOML snapshot instead of the registry.
    #[arg(short, long, global = true, value_name = "path")]
    pub snapshot: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self, dispatch: Dispatch) -> Result<()> {
        let config = match &self.config {
            Some(path) => SyncConfig::load_or_default(path)?,
            None => SyncConfig::load_or_default(default_config_path()?)?,
        };
        match &self.snapshot {
            Some(path) => {
                let store = SnapshotStore::open(path)?;
                let channel = SystemChannel::new(config.command_timeout());
                let packages = AppxPackageProbe::new(channel.clone());
                let sync =
                    Synchronizer::new(store, channel, packages, config).with_dispatch(dispatch);
                run_command(self.command, &sync).await
            }
            None => {
                let sync = Synchronizer::system(config).with_dispatch(dispatch);
                run_command(self.command, &sync).await
            }
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show registered distributions joined with their run state.
    #[command(override_usage = "wslsync list [options]")]
    List(ListOptions),

    /// Show names of running distributions.
    #[command(override_usage = "wslsync running")]
    Running,

    /// Check if distribution is running.
    #[command(override_usage = "wslsync is-running <distribution>")]
    IsRunning(TargetOptions),

    /// Terminate running distribution.
    #[command(override_usage = "wslsync terminate <distribution>")]
    Terminate(TargetOptions),

    /// Unregister distribution, deleting its file system.
    #[command(override_usage = "wslsync unregister <distribution>")]
    Unregister(TargetOptions),

    /// Open interactive session in distribution.
    #[command(override_usage = "wslsync launch [options] <distribution>")]
    Launch(LaunchOptions),

    /// Install distribution from the online catalog.
    #[command(override_usage = "wslsync install <distribution>")]
    Install(TargetOptions),

    /// Show effective configuration.
    #[command(override_usage = "wslsync config")]
    Config,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Print inventory as TOML document.
    #[arg(short, long)]
    pub toml: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct TargetOptions {
    /// Name of target distribution.
    #[arg(required = true, value_name = "distribution")]
    pub name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LaunchOptions {
    /// Name of target distribution.
    #[arg(required = true, value_name = "distribution")]
    pub name: String,

    /// Terminal profile to open session with.
    #[arg(short, long, value_name = "profile")]
    pub profile: Option<String>,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    let dispatch = Dispatch::new(tracing_subscriber::registry().with(layer).with(filter));
    dispatcher::set_global_default(dispatch.clone()).unwrap();

    if let Err(error) = Cli::parse().run(dispatch).await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run_command<S>(command: Command, sync: &Synchronizer<S>) -> Result<()>
where
    S: RegistrationStore,
{
    match command {
        Command::List(opts) => run_list(opts, sync).await,
        Command::Running => run_running(sync).await,
        Command::IsRunning(opts) => {
            println!("{}", sync.is_running(&opts.name).await?);
            Ok(())
        }
        Command::Terminate(opts) => Ok(sync.terminate(&opts.name).await?),
        Command::Unregister(opts) => Ok(sync.unregister(&opts.name).await?),
        Command::Launch(opts) => Ok(sync.launch(&opts.name, opts.profile.as_deref()).await?),
        Command::Install(opts) => Ok(sync.install(&opts.name).await?),
        Command::Config => {
            print!("{}", sync.config());
            Ok(())
        }
    }
}

async fn run_list<S>(opts: ListOptions, sync: &Synchronizer<S>) -> Result<()>
where
    S: RegistrationStore,
{
    let inventory = sync.snapshot().await?;
    if opts.toml {
        print!("{}", toml::ser::to_string_pretty(&inventory)?);
    } else {
        print_inventory(&inventory);
    }

    Ok(())
}

async fn run_running<S>(sync: &Synchronizer<S>) -> Result<()>
where
    S: RegistrationStore,
{
    let mut names = sync.list_running_names().await?.into_iter().collect::<Vec<_>>();
    names.sort();
    for name in names {
        println!("{name}");
    }

    Ok(())
}

fn print_inventory(inventory: &Inventory) {
    println!("  {:<28} {:<8} {:<8} KEY", "NAME", "STATE", "VERSION");
    for entry in &inventory.entries {
        let marker = if entry.entity.is_default { "*" } else { " " };
        let state = if entry.is_running { "Running" } else { "Stopped" };
        let version = match entry.entity.format_version {
            FormatVersion::V1 => "1",
            FormatVersion::V2 => "2",
        };
        println!(
            "{marker} {:<28} {state:<8} {version:<8} {}",
            entry.entity.name, entry.entity.identity_key
        );
    }

    for name in &inventory.orphaned_running {
        println!("  {name:<28} {:<8} {:<8} <unregistered>", "Running", "?");
    }
}
