//! Peer identity: a 20-byte, content-derived identifier.
//!
//! Rendered as `0x` followed by 40 hex digits with a mixed-case checksum
//! (Keccak-256 of the lowercase hex, as used for chain addresses).

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use sha3::Keccak256;

use super::errors::IdentityError;

/// Length of an identity in bytes.
pub const IDENTITY_LEN: usize = 20;

const ADJECTIVES: [&str; 32] = [
    "Amber", "Azure", "Brass", "Cedar", "Cobalt", "Copper", "Coral", "Crimson", "Dusky",
    "Ebony", "Emerald", "Fallow", "Garnet", "Golden", "Hazel", "Indigo", "Ivory", "Jade",
    "Khaki", "Lilac", "Maroon", "Ochre", "Olive", "Onyx", "Pearl", "Russet", "Sable",
    "Scarlet", "Silver", "Slate", "Teal", "Umber",
];

const NOUNS: [&str; 32] = [
    "Alpha", "Badger", "Comet", "Delta", "Ember", "Falcon", "Glacier", "Harbor", "Heron",
    "Iris", "Juniper", "Kestrel", "Lantern", "Lynx", "Meadow", "Nebula", "Orchid", "Otter",
    "Pike", "Quartz", "Raven", "Sierra", "Sparrow", "Summit", "Tango", "Thistle", "Tundra",
    "Vega", "Willow", "Wren", "Yarrow", "Zephyr",
];

/// 20-byte identifier of a worker.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerIdentity([u8; IDENTITY_LEN]);

impl PeerIdentity {
    /// Wrap raw identity bytes.
    pub fn new(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive an identity from public key material: the last 20 bytes of its
    /// Keccak-256 digest.
    pub fn derive(public_material: &[u8]) -> Self {
        let digest = Keccak256::digest(public_material);
        let mut bytes = [0u8; IDENTITY_LEN];
        bytes.copy_from_slice(&digest[32 - IDENTITY_LEN..]);
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Parse a `0x`-prefixed hex identity.
    ///
    /// All-lowercase and all-uppercase digits are accepted as unchecksummed;
    /// mixed case must match the checksum exactly.
    pub fn parse(text: &str) -> Result<Self, IdentityError> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .ok_or(IdentityError::MissingPrefix)?;
        if digits.len() != IDENTITY_LEN * 2 {
            return Err(IdentityError::InvalidLength {
                expected: IDENTITY_LEN * 2,
                actual: digits.len(),
            });
        }

        let mut bytes = [0u8; IDENTITY_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| IdentityError::InvalidHex)?;
        let identity = Self(bytes);

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && identity.to_checksum_string()[2..] != *digits {
            return Err(IdentityError::BadChecksum);
        }
        Ok(identity)
    }

    /// Mixed-case checksummed rendering, e.g. `0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed`.
    pub fn to_checksum_string(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());
        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Deterministic human-readable label: two words and a four-digit hex
    /// suffix, e.g. `Teal Falcon 3fa2`.
    pub fn nickname(&self) -> String {
        let digest = Sha256::digest(self.0);
        let adjective = ADJECTIVES[digest[0] as usize % ADJECTIVES.len()];
        let noun = NOUNS[digest[1] as usize % NOUNS.len()];
        format!("{adjective} {noun} {}", hex::encode(&digest[2..4]))
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum_string())
    }
}

impl fmt::Debug for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerIdentity({})", self.to_checksum_string())
    }
}

impl FromStr for PeerIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<[u8]> for PeerIdentity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
