#![forbid(unsafe_code)]
#![deny(clippy::float_arithmetic)]
#![deny(clippy::float_cmp)]

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use registry_core::{Address, Hash32, SystemClock};
use registry_node::config::{self, LogFormat, LoggingConfig, RegistryNodeConfig};
use registry_node::keyfile::read_keypair_file;
use registry_node::{ClientError, RegistryClient};
use registry_program::{
    CreateSubnetRequest, Ledger, NeuronRef, UpdateNeuronStatusArgs, UpdateSubnetConfigRequest,
    REGISTRY_PROGRAM_ID,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Subnet registry node")]
struct Args {
    /// Path to a TOML config file. If omitted, uses `REGISTRY_NODE_CONFIG`.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a subnet governed by the signer.
    CreateSubnet {
        /// File holding the governor's hex-encoded Ed25519 seed.
        #[arg(long)]
        governor_key: PathBuf,
        #[arg(long)]
        subnet_id: u16,
        #[arg(long)]
        max_neurons: u16,
        #[arg(long, default_value_t = 0)]
        validator_limit: u16,
        #[arg(long, default_value_t = 0)]
        emission_rate: u64,
        /// Incentive function digest (32-byte hex). Defaults to zeros.
        #[arg(long, value_parser = parse_hash)]
        incentive_hash: Option<Hash32>,
    },

    /// Register the signing hotkey as a neuron of a subnet.
    RegisterNeuron {
        #[arg(long)]
        hotkey_key: PathBuf,
        /// Coldkey address (32-byte hex).
        #[arg(long, value_parser = parse_address)]
        coldkey: Address,
        #[arg(long)]
        subnet_id: u16,
    },

    /// Change subnet parameters (governor only). Omitted flags are left as is.
    UpdateSubnetConfig {
        #[arg(long)]
        governor_key: PathBuf,
        #[arg(long)]
        subnet_id: u16,
        #[arg(long)]
        max_neurons: Option<u16>,
        #[arg(long)]
        validator_limit: Option<u16>,
        #[arg(long)]
        emission_rate: Option<u64>,
        #[arg(long, value_parser = parse_hash)]
        incentive_hash: Option<Hash32>,
    },

    /// Remove a neuron whose immunity has lapsed (consensus authority only).
    PruneNeuron {
        #[arg(long)]
        authority_key: PathBuf,
        #[arg(long)]
        subnet_id: u16,
        #[arg(long)]
        uid: u16,
        #[arg(long, value_parser = parse_address)]
        hotkey: Address,
    },

    /// Overwrite neuron metrics (consensus or staking authority only).
    UpdateNeuronStatus {
        #[arg(long)]
        authority_key: PathBuf,
        #[arg(long)]
        subnet_id: u16,
        #[arg(long, value_parser = parse_address)]
        hotkey: Address,
        #[arg(long)]
        rank: Option<u64>,
        #[arg(long)]
        trust: Option<u64>,
        #[arg(long)]
        incentive: Option<u64>,
        #[arg(long)]
        validator_trust: Option<u64>,
        #[arg(long)]
        is_validator: Option<bool>,
    },

    /// Print a subnet record (null when absent).
    GetSubnet {
        #[arg(long)]
        subnet_id: u16,
    },

    /// Print a neuron record (null when absent).
    GetNeuron {
        #[arg(long)]
        subnet_id: u16,
        #[arg(long, value_parser = parse_address)]
        hotkey: Address,
    },

    /// Print a derived account address without touching the ledger.
    DeriveAddress {
        #[command(subcommand)]
        target: DeriveTarget,
    },
}

#[derive(Debug, Subcommand)]
enum DeriveTarget {
    Subnet {
        #[arg(long)]
        subnet_id: u16,
    },
    Neuron {
        #[arg(long)]
        subnet_id: u16,
        #[arg(long, value_parser = parse_address)]
        hotkey: Address,
    },
}

fn parse_address(s: &str) -> Result<Address, String> {
    Address::from_hex(s)
}

fn parse_hash(s: &str) -> Result<Hash32, String> {
    Hash32::from_hex(s)
}

fn main() {
    let args = Args::parse();

    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = cfg_path
        .as_deref()
        .map(config::load_config)
        .transpose()
        .unwrap_or_else(|e| exit_err(&e.to_string()));

    init_logging(cfg.as_ref().map(|c| &c.logging));

    let result = match args.command {
        Command::DeriveAddress { target } => derive_address(cfg.as_ref(), target),
        command => {
            let cfg = cfg.unwrap_or_else(|| {
                exit_err("missing config: pass --config or set REGISTRY_NODE_CONFIG")
            });
            cfg.validate()
                .unwrap_or_else(|e| exit_err(&format!("invalid config: {e}")));
            run(&cfg, command)
        }
    };

    match result {
        Ok(v) => print_json(&v),
        Err(e) => {
            let body = match e.downcast_ref::<ClientError>() {
                Some(ce) => json!({
                    "error": {
                        "code": ce.code(),
                        "kind": ce.kind().as_str(),
                        "retryable": ce.is_retryable(),
                        "outcome": ce.outcome(),
                        "message": ce.to_string(),
                    }
                }),
                None => json!({ "error": { "code": "internal", "message": format!("{e:#}") } }),
            };
            print_json(&body);
            std::process::exit(1);
        }
    }
}

fn run(cfg: &RegistryNodeConfig, command: Command) -> anyhow::Result<serde_json::Value> {
    let program = cfg.program_config()?;
    let ledger = Arc::new(
        Ledger::open(&cfg.ledger.path, program.clone(), Arc::new(SystemClock))
            .with_context(|| format!("failed to open ledger at {}", cfg.ledger.path))?,
    );
    let client = RegistryClient::new(ledger.clone(), &program).with_confirm(cfg.confirm);
    info!(
        event = "registry_node_start",
        ledger = %cfg.ledger.path,
        program_id = %program.program_id
    );

    let out = match command {
        Command::CreateSubnet {
            governor_key,
            subnet_id,
            max_neurons,
            validator_limit,
            emission_rate,
            incentive_hash,
        } => {
            let governor = load_key(&governor_key)?;
            let req = CreateSubnetRequest {
                subnet_id,
                max_neurons,
                validator_limit,
                emission_rate,
                incentive_function_hash: incentive_hash.unwrap_or_default(),
            };
            serde_json::to_value(client.create_subnet(&governor, &req)?)?
        }
        Command::RegisterNeuron {
            hotkey_key,
            coldkey,
            subnet_id,
        } => {
            let hotkey = load_key(&hotkey_key)?;
            serde_json::to_value(client.register_neuron(&hotkey, &coldkey, subnet_id)?)?
        }
        Command::UpdateSubnetConfig {
            governor_key,
            subnet_id,
            max_neurons,
            validator_limit,
            emission_rate,
            incentive_hash,
        } => {
            let governor = load_key(&governor_key)?;
            let req = UpdateSubnetConfigRequest {
                subnet_id,
                max_neurons,
                validator_limit,
                emission_rate,
                incentive_function_hash: incentive_hash,
            };
            serde_json::to_value(client.update_subnet_config(&governor, &req)?)?
        }
        Command::PruneNeuron {
            authority_key,
            subnet_id,
            uid,
            hotkey,
        } => {
            let authority = load_key(&authority_key)?;
            serde_json::to_value(client.prune_neuron(&authority, subnet_id, uid, &hotkey)?)?
        }
        Command::UpdateNeuronStatus {
            authority_key,
            subnet_id,
            hotkey,
            rank,
            trust,
            incentive,
            validator_trust,
            is_validator,
        } => {
            let authority = load_key(&authority_key)?;
            let args = UpdateNeuronStatusArgs {
                rank,
                trust,
                incentive,
                validator_trust,
                is_validator,
            };
            let neuron = NeuronRef { subnet_id, hotkey };
            serde_json::to_value(client.update_neuron_status(&authority, neuron, args)?)?
        }
        Command::GetSubnet { subnet_id } => json!({
            "address": client.subnet_address(subnet_id)?,
            "subnet": client.get_subnet(subnet_id)?,
        }),
        Command::GetNeuron { subnet_id, hotkey } => json!({
            "address": client.neuron_address(subnet_id, &hotkey)?,
            "neuron": client.get_neuron(subnet_id, &hotkey)?,
        }),
        Command::DeriveAddress { target } => return derive_address(Some(cfg), target),
    };
    ledger.flush()?;
    Ok(out)
}

fn derive_address(
    cfg: Option<&RegistryNodeConfig>,
    target: DeriveTarget,
) -> anyhow::Result<serde_json::Value> {
    let program_id = match cfg {
        Some(c) => c.program_config()?.program_id,
        None => REGISTRY_PROGRAM_ID,
    };
    let (namespace, derived) = match target {
        DeriveTarget::Subnet { subnet_id } => (
            "subnet",
            registry_program::subnet_address(&program_id, subnet_id)?,
        ),
        DeriveTarget::Neuron { subnet_id, hotkey } => (
            "neuron",
            registry_program::neuron_address(&program_id, subnet_id, &hotkey)?,
        ),
    };
    Ok(json!({
        "namespace": namespace,
        "program_id": program_id,
        "address": derived.address,
        "bump": derived.bump,
    }))
}

fn load_key(path: &Path) -> anyhow::Result<registry_core::Keypair> {
    Ok(read_keypair_file(path)?)
}

fn print_json(v: &serde_json::Value) {
    match serde_json::to_string_pretty(v) {
        Ok(s) => println!("{s}"),
        Err(e) => exit_err(&format!("failed to encode output: {e}")),
    }
}

fn resolve_config_path(cli: Option<&Path>) -> Option<String> {
    if let Some(p) = cli {
        return Some(p.to_string_lossy().to_string());
    }
    std::env::var("REGISTRY_NODE_CONFIG").ok()
}

/// Logs go to stderr so stdout stays a single JSON document.
fn init_logging(cfg: Option<&LoggingConfig>) {
    let defaults = LoggingConfig::default();
    let cfg = cfg.unwrap_or(&defaults);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cfg.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn exit_err(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(2);
}
