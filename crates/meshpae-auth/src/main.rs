//! Mesh PAE authenticator binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve PAN 0x1234 with keys stored in ./pae.redb
//! meshpae-auth --store pae.redb --pan-id 0x1234 --network-name field-mesh
//!
//! # Cap admissions and use strict FIFO eviction
//! meshpae-auth --node-limit 500 --eviction-policy strict-fifo-wait
//! ```

use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use meshpae_auth::{PaeConfig, RuntimeConfig, RuntimeError};
use meshpae_core::EvictionPolicy;
use meshpae_nvm::{Eui64, NetworkName};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// GTK eviction policy when every slot is occupied
#[derive(ValueEnum, Debug, Clone, Copy)]
enum Eviction {
    /// Refuse the install
    Reject,
    /// Free the oldest non-Active slot
    OldestInactive,
    /// Free the oldest slot unless it is Active
    StrictFifoWait,
    /// Free the oldest slot even if it is Active
    StrictFifoForceExpiry,
}

impl From<Eviction> for EvictionPolicy {
    fn from(value: Eviction) -> Self {
        match value {
            Eviction::Reject => Self::Reject,
            Eviction::OldestInactive => Self::OldestInactive,
            Eviction::StrictFifoWait => Self::StrictFifoWait,
            Eviction::StrictFifoForceExpiry => Self::StrictFifoForceExpiry,
        }
    }
}

/// Mesh PAE authenticator
#[derive(Parser, Debug)]
#[command(name = "meshpae-auth")]
#[command(about = "Mesh PAE authenticator key management")]
#[command(version)]
struct Args {
    /// Path of the key store database
    #[arg(short, long, default_value = "meshpae.redb")]
    store: PathBuf,

    /// PAN identifier (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "0xffff", value_parser = parse_pan_id)]
    pan_id: u16,

    /// Network name
    #[arg(long, default_value = "")]
    network_name: String,

    /// EUI-64 of this authenticator (16 hex digits, optional separators)
    #[arg(long)]
    key_generator: Option<Eui64>,

    /// Lifetime of generated GTKs in seconds
    #[arg(long, default_value = "2592000")]
    gtk_lifetime_secs: u64,

    /// Maximum concurrently Authenticated supplicants
    #[arg(long)]
    node_limit: Option<usize>,

    /// GTK eviction policy
    #[arg(long, value_enum, default_value = "oldest-inactive")]
    eviction_policy: Eviction,

    /// Slow timer period in seconds
    #[arg(long, default_value = "1")]
    slow_tick_secs: u64,

    /// Run with the authenticator disabled
    #[arg(long)]
    disabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_pan_id(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid PAN id {s:?}: {e}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let network_name = NetworkName::new(args.network_name.as_str())
        .map_err(|e| RuntimeError::Config(e.to_string()))?;

    let defaults = RuntimeConfig::default();
    let config = RuntimeConfig {
        store_path: args.store,
        pae: PaeConfig {
            enabled: !args.disabled,
            pan_id: args.pan_id,
            network_name,
            key_generator: args.key_generator.unwrap_or(Eui64::ZERO),
            gtk_lifetime_secs: args.gtk_lifetime_secs,
            eviction_policy: args.eviction_policy.into(),
            node_limit: args.node_limit,
            ..PaeConfig::default()
        },
        slow_tick: Duration::from_secs(args.slow_tick_secs),
        ..defaults
    };

    tracing::info!(
        pan_id = config.pae.pan_id,
        network = %config.pae.network_name,
        enabled = config.pae.enabled,
        "mesh PAE authenticator starting"
    );

    meshpae_auth::run(config).await?;

    Ok(())
}
