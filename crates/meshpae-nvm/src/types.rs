//! Primitive identifiers and key material shared by all records.

use std::{fmt, str::FromStr};

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::NvmError;

/// Number of GTK slots in a key set.
pub const GTK_SLOT_COUNT: usize = 4;

/// GTK length in bytes.
pub const GTK_LEN: usize = 16;

/// PMK length in bytes.
pub const PMK_LEN: usize = 32;

/// PTK length in bytes.
pub const PTK_LEN: usize = 48;

/// Maximum network name length in bytes (excluding the terminator).
pub const NETWORK_NAME_MAX: usize = 32;

/// Group Temporal Key material.
pub type GtkKey = KeyMaterial<GTK_LEN>;

/// Pairwise Master Key material.
pub type PmkKey = KeyMaterial<PMK_LEN>;

/// Pairwise Transient Key material.
pub type PtkKey = KeyMaterial<PTK_LEN>;

/// Fixed-size secret key bytes.
///
/// Zeroized on drop. `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial<const N: usize>([u8; N]);

impl<const N: usize> KeyMaterial<N> {
    /// Wrap raw key bytes.
    #[must_use]
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> From<[u8; N]> for KeyMaterial<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> fmt::Debug for KeyMaterial<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial<{N}>(..)")
    }
}

/// Index of a GTK slot (0..4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u8);

impl SlotId {
    /// Slot for `index`. `None` if out of range.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < GTK_SLOT_COUNT { Some(Self(index)) } else { None }
    }

    /// All slot ids in index order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..GTK_SLOT_COUNT as u8).map(Self)
    }

    /// Slot index as `usize` for array access.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Slot index as raw byte.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// IEEE EUI-64 node identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Eui64(pub [u8; 8]);

impl Eui64 {
    /// All-zero identifier.
    pub const ZERO: Self = Self([0; 8]);

    /// Raw bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 8] {
        self.0
    }
}

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Eui64({self})")
    }
}

/// Error parsing an [`Eui64`] from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid EUI-64 {0:?}: expected 8 hex octets")]
pub struct ParseEui64Error(String);

impl FromStr for Eui64 {
    type Err = ParseEui64Error;

    /// Accepts `00:11:22:33:44:55:66:77`, `00-11-...` or 16 bare hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.len() != 16 {
            return Err(ParseEui64Error(s.to_string()));
        }

        let mut out = [0u8; 8];
        for (i, byte) in out.iter_mut().enumerate() {
            let pair = digits.get(i * 2..i * 2 + 2).ok_or_else(|| ParseEui64Error(s.to_string()))?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| ParseEui64Error(s.to_string()))?;
        }
        Ok(Self(out))
    }
}

/// Network name, at most [`NETWORK_NAME_MAX`] bytes of UTF-8 without NUL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NetworkName(String);

impl NetworkName {
    /// Validate and wrap a network name.
    pub fn new(name: impl Into<String>) -> Result<Self, NvmError> {
        let name = name.into();
        if name.len() > NETWORK_NAME_MAX {
            return Err(NvmError::invalid(
                "network_name",
                format!("{} bytes exceeds maximum {NETWORK_NAME_MAX}", name.len()),
            ));
        }
        if name.as_bytes().contains(&0) {
            return Err(NvmError::invalid("network_name", "contains NUL byte"));
        }
        Ok(Self(name))
    }

    /// Name as string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty name.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NetworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for NetworkName {
    type Error = NvmError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eui64_parses_colon_and_bare_forms() {
        let a: Eui64 = "00:11:22:33:44:55:66:77".parse().unwrap();
        let b: Eui64 = "0011223344556677".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "00:11:22:33:44:55:66:77");
    }

    #[test]
    fn eui64_rejects_short_input() {
        assert!("00:11:22".parse::<Eui64>().is_err());
        assert!("zz11223344556677".parse::<Eui64>().is_err());
    }

    #[test]
    fn network_name_limits() {
        assert!(NetworkName::new("a".repeat(32)).is_ok());
        assert!(NetworkName::new("a".repeat(33)).is_err());
        assert!(NetworkName::new("bad\0name").is_err());
        assert!(NetworkName::new("").unwrap().is_empty());
    }

    #[test]
    fn slot_id_bounds() {
        assert!(SlotId::new(3).is_some());
        assert!(SlotId::new(4).is_none());
        assert_eq!(SlotId::all().count(), GTK_SLOT_COUNT);
    }

    #[test]
    fn key_material_zeroizes() {
        let mut key = PmkKey::new([0x5A; PMK_LEN]);
        key.zeroize();
        assert_eq!(key.as_bytes(), &[0; PMK_LEN]);
    }

    #[test]
    fn key_material_zeroizes_on_drop() {
        fn assert_zeroize_on_drop<T: ZeroizeOnDrop>() {}
        assert_zeroize_on_drop::<GtkKey>();
        assert_zeroize_on_drop::<PtkKey>();
    }

    #[test]
    fn key_material_debug_is_redacted() {
        let key = GtkKey::new([0xAB; GTK_LEN]);
        assert!(!format!("{key:?}").contains("ab"));
        assert!(!format!("{key:?}").contains("171"));
    }
}
