//! Secret generation and execution conditions.
//!
//! A condition is the SHA-256 digest of a 32-byte secret. Handing out the
//! secret is what authorizes the release of funds locked to the condition.

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// 32-byte preimage released as proof of payment.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fulfillment([u8; 32]);

/// SHA-256 digest of a [`Fulfillment`]. Keys the pending table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition([u8; 32]);

impl Fulfillment {
    /// Draws a fresh secret from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self(secret)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn condition(&self) -> Condition {
        let mut hasher = Sha256::new();
        hasher.update(self.0);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Condition(hash)
    }

    /// True when this secret hashes to `condition`.
    pub fn fulfills(&self, condition: &Condition) -> bool {
        self.condition() == *condition
    }
}

impl Condition {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

// Secrets are never printed in full.
impl fmt::Debug for Fulfillment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fulfillment({}..)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condition({})", hex::encode(self.0))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

fn parse_hex32<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let bytes = hex::decode(&text).map_err(serde::de::Error::custom)?;
    bytes
        .try_into()
        .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
}

impl Serialize for Fulfillment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Fulfillment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        parse_hex32(deserializer).map(Self)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        parse_hex32(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_fulfillments_differ() {
        let f1 = Fulfillment::random();
        let f2 = Fulfillment::random();
        assert_ne!(f1, f2);
        assert_ne!(f1.condition(), f2.condition());
    }

    #[test]
    fn test_condition_is_sha256_of_preimage() {
        // sha256 of 32 zero bytes
        let fulfillment = Fulfillment::from_bytes([0u8; 32]);
        assert_eq!(
            fulfillment.condition().to_string(),
            "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
    }

    #[test]
    fn test_fulfills_only_its_own_condition() {
        let fulfillment = Fulfillment::random();
        let condition = fulfillment.condition();
        assert!(fulfillment.fulfills(&condition));
        assert!(!Fulfillment::from_bytes([0xAB; 32]).fulfills(&condition));
    }

    #[test]
    fn test_hex_serde() {
        let condition = Condition::from_bytes([0xCD; 32]);
        let json = serde_json::to_string(&condition).unwrap();
        assert_eq!(json, format!("\"{}\"", "cd".repeat(32)));
        let back: Condition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, condition);

        let short: Result<Condition, _> = serde_json::from_str("\"abcd\"");
        assert!(short.is_err());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let fulfillment = Fulfillment::from_bytes([0x11; 32]);
        assert_eq!(format!("{:?}", fulfillment), "Fulfillment(11111111..)");
    }
}
