//! MAC address normalization into OUI lookup keys.
//!
//! Switches and routers print MAC addresses in many shapes:
//!
//! - `00:1B:63:AA:BB:CC` (colon)
//! - `00-1b-63-aa-bb-cc` (dash)
//! - `001b.63aa.bbcc` (Cisco dot notation)
//! - `D8.C7.C8.14C17B` (some ARP tables)
//! - `001B63AABBCC` (raw hex)
//! - `00:1b:63:aa:bb:cc/ff:ff:ff:ff:ff:ff` or `.../24` (masked forms)
//!
//! All of them normalize to the same [`OuiKey`], the first three octets as six
//! uppercase hex characters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::InvalidMacFormat;

/// Number of hex digits in a full MAC address.
const MAC_HEX_LEN: usize = 12;

/// Number of hex digits in an OUI.
const OUI_HEX_LEN: usize = 6;

/// Canonical OUI key: six uppercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OuiKey([u8; OUI_HEX_LEN]);

impl OuiKey {
    /// Normalize a full MAC address into its OUI key.
    ///
    /// Anything after the first `/` or whitespace is discarded, separators
    /// (`:`, `-`, `.`) are removed, and exactly twelve hex digits must remain.
    ///
    /// # Examples
    ///
    /// ```
    /// use netvendor::oui::OuiKey;
    ///
    /// let a = OuiKey::from_mac("00:1b:63:aa:bb:cc").unwrap();
    /// let b = OuiKey::from_mac("001B.63AA.BBCC").unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str(), "001B63");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`InvalidMacFormat`] for wrong lengths or non-hex characters.
    pub fn from_mac(mac: &str) -> Result<Self, InvalidMacFormat> {
        let hex = mac_hex_digits(mac).ok_or_else(|| InvalidMacFormat::new(mac))?;
        Ok(Self::from_hex_prefix(&hex))
    }

    /// The key as a string slice, e.g. `"001B63"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII hex digits are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    fn from_hex_prefix(hex: &str) -> Self {
        let mut bytes = [0u8; OUI_HEX_LEN];
        bytes.copy_from_slice(&hex.as_bytes()[..OUI_HEX_LEN]);
        Self(bytes)
    }
}

impl fmt::Display for OuiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses either a bare OUI (`001B63`, `00:1b:63`) or a full MAC address.
impl FromStr for OuiKey {
    type Err = InvalidMacFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = strip_separators(s.trim());
        if stripped.len() == OUI_HEX_LEN && is_hex(&stripped) {
            return Ok(Self::from_hex_prefix(&stripped));
        }
        Self::from_mac(s)
    }
}

impl Serialize for OuiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OuiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Render a MAC address as lowercase colon-separated octets.
///
/// # Examples
///
/// ```
/// use netvendor::oui::canonical_mac;
///
/// assert_eq!(canonical_mac("001B.63AA.BBCC").unwrap(), "00:1b:63:aa:bb:cc");
/// ```
///
/// # Errors
///
/// Returns [`InvalidMacFormat`] when the input is not a MAC address.
pub fn canonical_mac(mac: &str) -> Result<String, InvalidMacFormat> {
    let hex = mac_hex_digits(mac).ok_or_else(|| InvalidMacFormat::new(mac))?;
    let lower = hex.to_ascii_lowercase();
    let octets: Vec<&str> = (0..MAC_HEX_LEN)
        .step_by(2)
        .map(|i| &lower[i..i + 2])
        .collect();
    Ok(octets.join(":"))
}

/// Whether `s` is a MAC address in any accepted notation.
#[must_use]
pub fn is_mac_address(s: &str) -> bool {
    mac_hex_digits(s).is_some()
}

/// Reduce a MAC string to its twelve uppercase hex digits.
fn mac_hex_digits(mac: &str) -> Option<String> {
    let body = mac
        .trim()
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    let hex = strip_separators(body);
    (hex.len() == MAC_HEX_LEN && is_hex(&hex)).then_some(hex)
}

fn strip_separators(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}
