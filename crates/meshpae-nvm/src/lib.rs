//! Persistent record formats for the mesh PAE authenticator.
//!
//! Records are stored as a 4-byte TLV envelope (tag, length; big endian)
//! followed by a fixed-size payload. Fixed sizes let a reader detect a torn
//! write from the envelope alone: a stored length that disagrees with the tag
//! means the page was only partially written, and the record is discarded.
//!
//! Payload layouts are declared as `#[repr(C, packed)]` byte-array structs
//! with compile-time verified `zerocopy` layouts, so every byte pattern is a
//! valid value and decoding never reads past the buffer.
//!
//! | Tag | Record | Payload bytes |
//! |---|---|---|
//! | 1 | [`NetworkInfo`] | 151 |
//! | 2 | [`SecurityKeys`] | 107 |
//! | 3 | [`FrameCounterSet`] | 98 |
//! | 4 | [`KeyStorageIndex`] | 8 |
//! | 5 | [`KeyStorageRecord`] | 115 |
//!
//! # Security
//!
//! Key material is held in [`KeyMaterial`], which is zeroized on drop and
//! never printed by `Debug`. Decoding validates every presence flag and
//! status byte; unknown values are rejected rather than guessed.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod frame_counter;
pub mod key_storage;
pub mod keys;
pub mod network_info;
pub mod tlv;
pub mod types;

pub use errors::{NvmError, Result};
pub use frame_counter::{BoundCounter, FrameCounterSet};
pub use key_storage::KeyStorageIndex;
pub use keys::{KeyStorageRecord, PmkEntry, PtkEntry, SecurityKeys};
pub use network_info::{GtkKeySet, GtkSlot, GtkStatus, NetworkInfo};
pub use tlv::{NvmRecord, RecordTag, TLV_HEADER_SIZE, open_envelope, peek_tag};
pub use types::{
    Eui64, GTK_LEN, GTK_SLOT_COUNT, GtkKey, KeyMaterial, NETWORK_NAME_MAX, NetworkName, PMK_LEN,
    PTK_LEN, ParseEui64Error, PmkKey, PtkKey, SlotId,
};
