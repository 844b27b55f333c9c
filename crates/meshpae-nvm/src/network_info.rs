//! Network identity and GTK key set record.

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::{
    errors::{NvmError, Result},
    tlv::{NvmRecord, RecordTag, read_flag},
    types::{Eui64, GTK_LEN, GTK_SLOT_COUNT, GtkKey, NETWORK_NAME_MAX, NetworkName, SlotId},
};

/// Lifecycle state of an occupied GTK slot.
///
/// An empty slot is represented by `None` in [`GtkKeySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GtkStatus {
    /// Distributed to nodes but not yet used for sending
    Installed,
    /// Current send key
    Active,
    /// Superseded send key, still accepted for decoding until expiry
    Expiring,
}

impl GtkStatus {
    /// Status byte as stored.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Installed => 1,
            Self::Active => 2,
            Self::Expiring => 3,
        }
    }

    /// Status for a stored byte. `None` if unknown.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Installed),
            2 => Some(Self::Active),
            3 => Some(Self::Expiring),
            _ => None,
        }
    }
}

/// One occupied GTK slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtkSlot {
    /// Key material
    pub key: GtkKey,
    /// Expiry as wall-clock seconds
    pub expiry: u64,
    /// Position in the install sequence, 0 being the oldest
    pub install_order: u8,
    /// Lifecycle state
    pub status: GtkStatus,
}

/// Up to [`GTK_SLOT_COUNT`] GTK slots indexed by [`SlotId`].
///
/// This is plain data. The lifecycle rules (single Active slot, compact
/// install orders) are enforced by the lifecycle manager that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GtkKeySet {
    slots: [Option<GtkSlot>; GTK_SLOT_COUNT],
}

impl GtkKeySet {
    /// Empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot contents. `None` if empty.
    #[must_use]
    pub fn get(&self, slot: SlotId) -> Option<&GtkSlot> {
        self.slots[slot.index()].as_ref()
    }

    /// Mutable slot contents. `None` if empty.
    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut GtkSlot> {
        self.slots[slot.index()].as_mut()
    }

    /// Replace a slot's contents, returning the previous value.
    pub fn replace(&mut self, slot: SlotId, value: Option<GtkSlot>) -> Option<GtkSlot> {
        std::mem::replace(&mut self.slots[slot.index()], value)
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &GtkSlot)> {
        SlotId::all().zip(self.slots.iter()).filter_map(|(id, s)| s.as_ref().map(|s| (id, s)))
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// First empty slot in index order.
    #[must_use]
    pub fn first_empty(&self) -> Option<SlotId> {
        SlotId::all().find(|id| self.slots[id.index()].is_none())
    }

    /// The Active slot, if any.
    #[must_use]
    pub fn active(&self) -> Option<(SlotId, &GtkSlot)> {
        self.iter().find(|(_, s)| s.status == GtkStatus::Active)
    }
}

/// Network identity plus the GTK key set snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    /// PAN identifier
    pub pan_id: u16,
    /// Network name
    pub name: NetworkName,
    /// EUI-64 of the node that generated the keys
    pub key_generator: Eui64,
    /// GTK key set
    pub gtks: GtkKeySet,
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawGtkSlot {
    set: u8,
    expiry: [u8; 8],
    status: u8,
    install_order: u8,
    key: [u8; GTK_LEN],
}

#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RawNetworkInfo {
    pan_id: [u8; 2],
    name: [u8; NETWORK_NAME_MAX + 1],
    key_generator: [u8; 8],
    gtks: [RawGtkSlot; GTK_SLOT_COUNT],
}

impl RawGtkSlot {
    fn from_slot(slot: Option<&GtkSlot>) -> Self {
        match slot {
            Some(s) => Self {
                set: 1,
                expiry: s.expiry.to_be_bytes(),
                status: s.status.to_byte(),
                install_order: s.install_order,
                key: *s.key.as_bytes(),
            },
            None => Self::new_zeroed(),
        }
    }

    fn to_slot(self) -> Result<Option<GtkSlot>> {
        if !read_flag(self.set, "gtk.set")? {
            return Ok(None);
        }

        let status = GtkStatus::from_byte(self.status).ok_or_else(|| {
            NvmError::invalid("gtk.status", format!("unknown status byte {:#04x}", self.status))
        })?;

        if usize::from(self.install_order) >= GTK_SLOT_COUNT {
            return Err(NvmError::invalid(
                "gtk.install_order",
                format!("{} out of range", self.install_order),
            ));
        }

        Ok(Some(GtkSlot {
            key: GtkKey::new(self.key),
            expiry: u64::from_be_bytes(self.expiry),
            install_order: self.install_order,
            status,
        }))
    }
}

fn encode_name(name: &NetworkName) -> [u8; NETWORK_NAME_MAX + 1] {
    let mut out = [0u8; NETWORK_NAME_MAX + 1];
    out[..name.len()].copy_from_slice(name.as_str().as_bytes());
    out
}

fn decode_name(raw: &[u8; NETWORK_NAME_MAX + 1]) -> Result<NetworkName> {
    let end = raw
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| NvmError::invalid("network_name", "missing terminator"))?;

    let name = std::str::from_utf8(&raw[..end])
        .map_err(|e| NvmError::invalid("network_name", e.to_string()))?;

    NetworkName::new(name)
}

impl NvmRecord for NetworkInfo {
    const TAG: RecordTag = RecordTag::NetworkInfo;

    fn write_payload(&self, out: &mut Vec<u8>) {
        let mut gtks = [RawGtkSlot::new_zeroed(); GTK_SLOT_COUNT];
        for id in SlotId::all() {
            gtks[id.index()] = RawGtkSlot::from_slot(self.gtks.get(id));
        }

        let raw = RawNetworkInfo {
            pan_id: self.pan_id.to_be_bytes(),
            name: encode_name(&self.name),
            key_generator: self.key_generator.bytes(),
            gtks,
        };
        out.extend_from_slice(raw.as_bytes());
    }

    fn read_payload(payload: &[u8]) -> Result<Self> {
        let raw = RawNetworkInfo::ref_from_bytes(payload).map_err(|_| NvmError::NvmCorrupt {
            tag: Self::TAG.to_u16(),
            expected: Self::TAG.payload_len(),
            actual: payload.len(),
        })?;

        let mut gtks = GtkKeySet::new();
        let raw_gtks = raw.gtks;
        for id in SlotId::all() {
            gtks.replace(id, raw_gtks[id.index()].to_slot()?);
        }

        Ok(Self {
            pan_id: u16::from_be_bytes(raw.pan_id),
            name: decode_name(&raw.name)?,
            key_generator: Eui64(raw.key_generator),
            gtks,
        })
    }
}
