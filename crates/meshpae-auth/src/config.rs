//! Authenticator configuration.

use meshpae_core::{
    CounterConfig, DEFAULT_NEW_INSTALL_REQUIRED_PCT, DEFAULT_RELAY_CAPACITY, DEFAULT_RELAY_TTL,
    EvictionPolicy,
};
use meshpae_nvm::{Eui64, NetworkName};

/// Default GTK lifetime: 30 days.
pub const DEFAULT_GTK_LIFETIME_SECS: u64 = 30 * 24 * 3600;

/// Authenticator configuration (network identity, timers, limits, policies).
#[derive(Debug, Clone)]
pub struct PaeConfig {
    /// Run the authenticator; `false` selects the disabled variant
    pub enabled: bool,
    /// PAN identifier of the network served
    pub pan_id: u16,
    /// Network name of the network served
    pub network_name: NetworkName,
    /// EUI-64 of this authenticator, recorded as key generator
    pub key_generator: Eui64,
    /// Lifetime given to newly installed GTKs
    pub gtk_lifetime_secs: u64,
    /// Share of the Active key's lifetime after which a successor is wanted
    pub new_install_required_pct: u8,
    /// What to do when all GTK slots are occupied
    pub eviction_policy: EvictionPolicy,
    /// Frame counter persistence and replay handling
    pub counters: CounterConfig,
    /// Loaded frame counter images older than this are logged as stale
    pub counter_max_age_secs: u64,
    /// TTL of relay entries, in seconds
    pub relay_ttl: u8,
    /// Relay entries kept before the oldest is dropped
    pub relay_capacity: usize,
    /// Fast timer ticks per second
    pub fast_ticks_per_second: u32,
    /// Ceiling on concurrently Authenticated supplicants; `None` is unlimited
    pub node_limit: Option<usize>,
    /// Supplicants revoked per slow tick during a revocation sweep
    pub revoke_batch_size: usize,
}

impl Default for PaeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pan_id: 0xFFFF,
            network_name: NetworkName::default(),
            key_generator: Eui64::ZERO,
            gtk_lifetime_secs: DEFAULT_GTK_LIFETIME_SECS,
            new_install_required_pct: DEFAULT_NEW_INSTALL_REQUIRED_PCT,
            eviction_policy: EvictionPolicy::default(),
            counters: CounterConfig::default(),
            counter_max_age_secs: DEFAULT_GTK_LIFETIME_SECS,
            relay_ttl: DEFAULT_RELAY_TTL,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            fast_ticks_per_second: 10,
            node_limit: None,
            revoke_batch_size: 5,
        }
    }
}
