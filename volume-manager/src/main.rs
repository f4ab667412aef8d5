// SPDX-License-Identifier: GPL-3.0-only

//! recovery-volumes - mount, unmount and format recovery volumes
//!
//! Thin command-line front end over [`volume_manager::VolumeManager`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};
use volume_manager::{OneShotOutcome, SystemBackend, VolumeManager, VolumeTable};
use volume_types::{Policy, VolumeError, policy::DEFAULT_POLICY_PATH};

#[derive(Debug, Parser)]
#[command(name = "recovery-volumes")]
#[command(about = "Manage the volumes of a recovery volume table", version)]
struct Cli {
    /// Policy file (TOML); defaults apply when it does not exist
    #[arg(long, default_value = DEFAULT_POLICY_PATH)]
    config: PathBuf,

    /// Volume table, overriding the policy's `fstab_path`
    #[arg(long)]
    fstab: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the loaded volume table
    Table,
    /// Make sure the volume at PATH is mounted
    Mount { path: String },
    /// Make sure the volume at PATH is not mounted
    Unmount { path: String },
    /// Recreate the filesystem of the volume at PATH
    Format { path: String },
    /// Mount scratch and cache, unmount everything else
    Setup,
    /// Zero the instaboot image header
    InstabootClear,
    /// Remove the persisted instaboot enable property
    InstabootDisable,
}

impl Command {
    fn mutates(&self) -> bool {
        !matches!(self, Command::Table)
    }
}

fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("recovery_volumes=info,volume_manager=info,warn")
        }))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        tracing::error!("{:#}", error);
        let code = error
            .downcast_ref::<VolumeError>()
            .map_or(1, |e| e.kind().exit_code());
        std::process::exit(code);
    }
}

fn report(operation: &str, outcome: OneShotOutcome) {
    match outcome {
        OneShotOutcome::Completed => println!("{operation}: done"),
        OneShotOutcome::AlreadyDone => println!("{operation}: already done"),
        OneShotOutcome::Skipped => println!("{operation}: skipped"),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut policy = Policy::load(&cli.config)
        .with_context(|| format!("loading policy {}", cli.config.display()))?;
    if let Some(fstab) = cli.fstab {
        policy.fstab_path = fstab;
    }

    if cli.command.mutates() && unsafe { libc::geteuid() } != 0 {
        tracing::error!("recovery-volumes must run as root");
        anyhow::bail!("{:?} requires root privileges", cli.command);
    }

    let table = VolumeTable::load(&policy)?;
    let manager = VolumeManager::new(&table, &policy, SystemBackend::new(&policy.tools));

    match cli.command {
        Command::Table => {
            for volume in table.iter() {
                println!(
                    "{}\t{}\t{}\t{}",
                    volume.mount_point, volume.fs_type, volume.blk_device, volume.length
                );
            }
        }
        Command::Mount { path } => manager.ensure_mounted(&path)?,
        Command::Unmount { path } => manager.ensure_unmounted(&path)?,
        Command::Format { path } => manager.format(&path)?,
        Command::Setup => manager.setup_install_mounts()?,
        Command::InstabootClear => report("instaboot-clear", manager.instaboot_clear()),
        Command::InstabootDisable => report("instaboot-disable", manager.instaboot_disable()),
    }
    Ok(())
}
