//! Enabled/disabled authenticator selection.
//!
//! Hosts talk to an [`Authenticator`] trait object. A node configured
//! without the authenticator gets [`DisabledAuthenticator`], which accepts
//! timer calls and refuses everything else, so the host needs no
//! conditional code paths.

use std::net::{Ipv6Addr, SocketAddrV6};

use meshpae_core::{Environment, RelayEntry};
use meshpae_nvm::{Eui64, GtkKey, SecurityKeys, SlotId};

use crate::{
    config::PaeConfig,
    controller::{Controller, ControllerEvent, GcReport},
    error::PaeError,
    hooks::KeyHooks,
    storage::NvmStore,
};

/// Operations a host can invoke on the authenticator.
pub trait Authenticator {
    /// False for the disabled variant.
    fn is_enabled(&self) -> bool;

    /// Fine-grained tick.
    fn fast_timer(&mut self, ticks: u32);

    /// Coarse tick.
    fn slow_timer(&mut self, seconds: u32) -> Result<Vec<ControllerEvent>, PaeError>;

    /// Start revoking every Authenticated supplicant.
    fn node_access_revoke_start(&mut self) -> usize;

    /// Limit concurrently Authenticated supplicants.
    fn node_limit_set(&mut self, limit: usize);

    /// Reclaim key storage and repair the index.
    fn forced_gc(&mut self) -> Result<GcReport, PaeError>;

    /// A supplicant started a handshake.
    fn begin_authentication(&mut self, eui64: Eui64) -> Result<(), PaeError>;

    /// A supplicant completed its handshake.
    fn supplicant_authenticated(
        &mut self,
        eui64: Eui64,
        keys: SecurityKeys,
    ) -> Result<(), PaeError>;

    /// Withdraw a supplicant's access.
    fn supplicant_revoked(&mut self, eui64: Eui64) -> Result<(), PaeError>;

    /// Install a new GTK.
    fn install_gtk(&mut self, key: GtkKey, lifetime_secs: u64) -> Result<SlotId, PaeError>;

    /// Activate an Installed GTK.
    fn activate_gtk(&mut self, slot: SlotId) -> Result<(), PaeError>;

    /// Outgoing frame counter for a slot.
    fn frame_counter_read(&self, slot: SlotId) -> Result<u32, PaeError>;

    /// Advance a slot's frame counter.
    fn frame_counter_set(&mut self, slot: SlotId, value: u32) -> Result<(), PaeError>;

    /// Record relayed traffic.
    fn relay_update(
        &mut self,
        address: Ipv6Addr,
        parent: SocketAddrV6,
    ) -> Result<RelayEntry, PaeError>;

    /// Look up a relay.
    fn relay_detect(&self, address: Ipv6Addr) -> Option<RelayEntry>;

    /// Persist what must survive and stop.
    fn shutdown(&mut self) -> Result<(), PaeError>;
}

impl<S: NvmStore, E: Environment> Authenticator for Controller<S, E> {
    fn is_enabled(&self) -> bool {
        true
    }

    fn fast_timer(&mut self, ticks: u32) {
        Controller::fast_timer(self, ticks);
    }

    fn slow_timer(&mut self, seconds: u32) -> Result<Vec<ControllerEvent>, PaeError> {
        Controller::slow_timer(self, seconds)
    }

    fn node_access_revoke_start(&mut self) -> usize {
        Controller::node_access_revoke_start(self)
    }

    fn node_limit_set(&mut self, limit: usize) {
        Controller::node_limit_set(self, limit);
    }

    fn forced_gc(&mut self) -> Result<GcReport, PaeError> {
        Controller::forced_gc(self)
    }

    fn begin_authentication(&mut self, eui64: Eui64) -> Result<(), PaeError> {
        Controller::begin_authentication(self, eui64)
    }

    fn supplicant_authenticated(
        &mut self,
        eui64: Eui64,
        keys: SecurityKeys,
    ) -> Result<(), PaeError> {
        Controller::supplicant_authenticated(self, eui64, keys)
    }

    fn supplicant_revoked(&mut self, eui64: Eui64) -> Result<(), PaeError> {
        Controller::supplicant_revoked(self, eui64)
    }

    fn install_gtk(&mut self, key: GtkKey, lifetime_secs: u64) -> Result<SlotId, PaeError> {
        Controller::install_gtk(self, key, lifetime_secs)
    }

    fn activate_gtk(&mut self, slot: SlotId) -> Result<(), PaeError> {
        Controller::activate_gtk(self, slot)
    }

    fn frame_counter_read(&self, slot: SlotId) -> Result<u32, PaeError> {
        Ok(Controller::frame_counter_read(self, slot))
    }

    fn frame_counter_set(&mut self, slot: SlotId, value: u32) -> Result<(), PaeError> {
        Controller::frame_counter_set(self, slot, value)
    }

    fn relay_update(
        &mut self,
        address: Ipv6Addr,
        parent: SocketAddrV6,
    ) -> Result<RelayEntry, PaeError> {
        Ok(Controller::relay_update(self, address, parent))
    }

    fn relay_detect(&self, address: Ipv6Addr) -> Option<RelayEntry> {
        Controller::relay_detect(self, address)
    }

    fn shutdown(&mut self) -> Result<(), PaeError> {
        Controller::shutdown(self)
    }
}

/// Authenticator for nodes configured without one.
///
/// Timers and administrative sweeps do nothing. Admission, key and counter
/// operations fail with [`PaeError::Disabled`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledAuthenticator;

impl Authenticator for DisabledAuthenticator {
    fn is_enabled(&self) -> bool {
        false
    }

    fn fast_timer(&mut self, _ticks: u32) {}

    fn slow_timer(&mut self, _seconds: u32) -> Result<Vec<ControllerEvent>, PaeError> {
        Ok(Vec::new())
    }

    fn node_access_revoke_start(&mut self) -> usize {
        0
    }

    fn node_limit_set(&mut self, _limit: usize) {}

    fn forced_gc(&mut self) -> Result<GcReport, PaeError> {
        Ok(GcReport::default())
    }

    fn begin_authentication(&mut self, _eui64: Eui64) -> Result<(), PaeError> {
        Err(PaeError::Disabled)
    }

    fn supplicant_authenticated(
        &mut self,
        _eui64: Eui64,
        _keys: SecurityKeys,
    ) -> Result<(), PaeError> {
        Err(PaeError::Disabled)
    }

    fn supplicant_revoked(&mut self, _eui64: Eui64) -> Result<(), PaeError> {
        Err(PaeError::Disabled)
    }

    fn install_gtk(&mut self, _key: GtkKey, _lifetime_secs: u64) -> Result<SlotId, PaeError> {
        Err(PaeError::Disabled)
    }

    fn activate_gtk(&mut self, _slot: SlotId) -> Result<(), PaeError> {
        Err(PaeError::Disabled)
    }

    fn frame_counter_read(&self, _slot: SlotId) -> Result<u32, PaeError> {
        Err(PaeError::Disabled)
    }

    fn frame_counter_set(&mut self, _slot: SlotId, _value: u32) -> Result<(), PaeError> {
        Err(PaeError::Disabled)
    }

    fn relay_update(
        &mut self,
        _address: Ipv6Addr,
        _parent: SocketAddrV6,
    ) -> Result<RelayEntry, PaeError> {
        Err(PaeError::Disabled)
    }

    fn relay_detect(&self, _address: Ipv6Addr) -> Option<RelayEntry> {
        None
    }

    fn shutdown(&mut self) -> Result<(), PaeError> {
        Ok(())
    }
}

/// Authenticator selected by [`PaeConfig::enabled`].
pub enum Pae<S: NvmStore, E: Environment> {
    /// Running controller
    Enabled(Box<Controller<S, E>>),
    /// Authenticator switched off
    Disabled(DisabledAuthenticator),
}

impl<S: NvmStore, E: Environment> Pae<S, E> {
    /// Start the variant `config` asks for. A disabled authenticator never
    /// touches the store.
    ///
    /// # Errors
    ///
    /// - `StorageUnavailable` if the enabled controller cannot start
    pub fn start(env: E, store: S, config: PaeConfig, hooks: KeyHooks) -> Result<Self, PaeError> {
        if !config.enabled {
            tracing::info!("authenticator disabled by configuration");
            return Ok(Self::Disabled(DisabledAuthenticator));
        }
        Ok(Self::Enabled(Box::new(Controller::start(env, store, config, hooks)?)))
    }

    /// The selected variant as a trait object.
    pub fn authenticator(&mut self) -> &mut dyn Authenticator {
        match self {
            Self::Enabled(controller) => controller.as_mut(),
            Self::Disabled(disabled) => disabled,
        }
    }

    /// The controller, if enabled.
    pub fn controller(&self) -> Option<&Controller<S, E>> {
        match self {
            Self::Enabled(controller) => Some(controller.as_ref()),
            Self::Disabled(_) => None,
        }
    }
}

impl<S: NvmStore, E: Environment> std::fmt::Debug for Pae<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enabled(controller) => f.debug_tuple("Enabled").field(controller).finish(),
            Self::Disabled(_) => f.write_str("Disabled"),
        }
    }
}
