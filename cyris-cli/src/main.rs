//! # cyris
//!
//! CLI entry point for the cyber-range orchestrator. Parses a declarative
//! range description, drives the `RangeOrchestrator` through its lifecycle
//! operations, and maps outcomes onto the exit code contract from spec §6.
//!
//! ## Usage
//! ```bash
//! cyris create range.yaml
//! cyris status 101
//! cyris destroy 101 --rm
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use cyris_core::{parse_description, CliKvmProvider, OrchestratorConfig, RangeOrchestrator, RangeState, RangeStore};
use tracing::{error, info};

mod cli;
mod config;

use cli::{Args, Command, LogFormat};
use config::GlobalConfig;

const EXIT_SUCCESS: u8 = 0;
const EXIT_OTHER: u8 = 1;
const EXIT_VALIDATION: u8 = 2;
const EXIT_PARTIAL: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("failed to initialize logging: {e:#}");
        return ExitCode::from(EXIT_OTHER);
    }

    let global = match GlobalConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load global configuration");
            return ExitCode::from(EXIT_OTHER);
        }
    };

    match run(args.command, global).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_OTHER)
        }
    }
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    match args.log_format {
        LogFormat::Text => cyris_common::init_logging(&args.log_level),
        LogFormat::Json => cyris_common::init_logging_json(&args.log_level),
    }
}

fn orchestrator_config(global: &GlobalConfig) -> OrchestratorConfig {
    OrchestratorConfig {
        base_path: global.base_path.clone(),
        libvirt_uri: global.libvirt_uri.clone(),
        cidr_pool: global.cidr_pool.clone(),
        upstream_iface: global.upstream_iface.clone(),
        ssh_key_override: global.ssh_key.clone(),
        ..Default::default()
    }
}

fn build_orchestrator(global: &GlobalConfig) -> RangeOrchestrator {
    let config = orchestrator_config(global);
    let provider = Arc::new(CliKvmProvider::new(global.libvirt_uri.clone(), global.base_path.join("disks")));
    RangeOrchestrator::new(config, provider)
}

async fn run(command: Command, global: GlobalConfig) -> anyhow::Result<u8> {
    match command {
        Command::Create { description, range_id, dry_run, build_only } => {
            let mut desc = match parse_description(&description) {
                Ok(desc) => desc,
                Err(cyris_core::CyrisError::Validation(msg)) => {
                    eprintln!("validation failed: {msg}");
                    return Ok(EXIT_VALIDATION);
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(id) = range_id {
                desc.clone.range_id = Some(id);
            }

            if dry_run {
                println!(
                    "plan: {} host(s), {} guest(s), {} network(s) — no side effects (--dry-run)",
                    desc.hosts.len(),
                    desc.guests.len(),
                    desc.clone.topology.len()
                );
                return Ok(EXIT_SUCCESS);
            }

            let orchestrator = build_orchestrator(&global);
            match orchestrator.create(&desc, build_only).await {
                Ok(range_id) => {
                    let status = orchestrator.status(&range_id).await?;
                    match status.state {
                        RangeState::Active => {
                            println!("range '{range_id}' created");
                            Ok(EXIT_SUCCESS)
                        }
                        RangeState::Error => {
                            println!(
                                "range '{range_id}' created with errors: {}",
                                status.error_message.unwrap_or_default()
                            );
                            Ok(EXIT_PARTIAL)
                        }
                        _ => Ok(EXIT_OTHER),
                    }
                }
                Err(cyris_core::CyrisError::Validation(msg)) => {
                    eprintln!("validation failed: {msg}");
                    Ok(EXIT_VALIDATION)
                }
                Err(e) => Err(e.into()),
            }
        }

        Command::Destroy { range_id, force, rm } => {
            let orchestrator = build_orchestrator(&global);
            orchestrator.destroy(&range_id, force).await?;
            if rm {
                RangeStore::new(&global.base_path).remove(&range_id)?;
            }
            println!("range '{range_id}' destroyed");
            Ok(EXIT_SUCCESS)
        }

        Command::Status { range_id } => {
            let orchestrator = build_orchestrator(&global);
            let status = orchestrator.status(&range_id).await?;
            println!("{}", serde_yaml::to_string(&status)?);
            Ok(EXIT_SUCCESS)
        }

        Command::List { all } => {
            let orchestrator = build_orchestrator(&global);
            let ranges = orchestrator.list()?;
            for record in ranges.iter().filter(|r| all || r.state != RangeState::Destroyed) {
                println!("{}\t{:?}\t{} domain(s)", record.range_id, record.state, record.domains.len());
            }
            Ok(EXIT_SUCCESS)
        }

        Command::SshInfo { range_id } => {
            let orchestrator = build_orchestrator(&global);
            let info = orchestrator.ssh_info(&range_id).await?;
            println!("{}", serde_yaml::to_string(&info)?);
            Ok(EXIT_SUCCESS)
        }

        Command::Validate { description } => match parse_description(&description) {
            Ok(desc) => {
                info!(hosts = desc.hosts.len(), guests = desc.guests.len(), "description is valid");
                println!("ok: {} host(s), {} guest(s)", desc.hosts.len(), desc.guests.len());
                Ok(EXIT_SUCCESS)
            }
            Err(cyris_core::CyrisError::Validation(msg)) => {
                eprintln!("validation failed: {msg}");
                Ok(EXIT_VALIDATION)
            }
            Err(e) => Err(e.into()),
        },

        Command::ConfigInit => {
            println!("{}", GlobalConfig::template());
            Ok(EXIT_SUCCESS)
        }

        Command::ConfigShow => {
            println!("{}", global.redacted_yaml()?);
            Ok(EXIT_SUCCESS)
        }
    }
}
