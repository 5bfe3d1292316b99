//! Prepare, fulfill and reject messages of a conditional payment exchange.

use super::address::Address;
use super::hash_lock::{Condition, Fulfillment};
use crate::error::{LoopError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Three-character reject reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// `F01`
    InvalidPacket,
    /// `F04`: the amount that arrived is below what the receiver requires.
    InsufficientDestinationAmount,
    /// `F08`: the amount exceeds a liquidity ceiling somewhere on the path.
    AmountTooLarge,
    Other(String),
}

impl ErrorCode {
    pub fn parse(code: &str) -> Result<Self> {
        match code {
            "F01" => Ok(Self::InvalidPacket),
            "F04" => Ok(Self::InsufficientDestinationAmount),
            "F08" => Ok(Self::AmountTooLarge),
            other if other.len() == 3 && other.is_ascii() => Ok(Self::Other(other.to_string())),
            other => Err(LoopError::InvalidPacket(format!(
                "reject code must be 3 characters, got {:?}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidPacket => "F01",
            Self::InsufficientDestinationAmount => "F04",
            Self::AmountTooLarge => "F08",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        ErrorCode::parse(&code).map_err(serde::de::Error::custom)
    }
}

/// Amounts travel as decimal strings.
mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

/// Conditional transfer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prepare {
    #[serde(with = "amount_string")]
    pub amount: u64,
    pub expires_at: DateTime<Utc>,
    pub execution_condition: Condition,
    pub destination: Address,
    #[serde(with = "hex_bytes", default)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfill {
    pub fulfillment: Fulfillment,
    #[serde(with = "hex_bytes", default)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub code: ErrorCode,
    pub triggered_by: Address,
    pub message: String,
    #[serde(with = "hex_bytes", default)]
    pub data: Vec<u8>,
}

/// Figures reported by a hop that refused a packet for exceeding its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountTooLarge {
    /// Amount the hop saw, in its own units.
    pub received_amount: u64,
    /// Largest amount the hop would have accepted, in the same units.
    pub maximum_amount: u64,
}

impl Reject {
    pub fn insufficient_destination_amount(triggered_by: Address) -> Self {
        Self {
            code: ErrorCode::InsufficientDestinationAmount,
            triggered_by,
            message: "Insufficient destination amount".to_string(),
            data: Vec::new(),
        }
    }

    pub fn invalid_packet(triggered_by: Address, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidPacket,
            triggered_by,
            message: message.into(),
            data: Vec::new(),
        }
    }

    /// Builds an `F08` reject. The data carries the received amount followed by
    /// the maximum amount, both big-endian u64.
    pub fn amount_too_large(triggered_by: Address, details: AmountTooLarge) -> Self {
        let mut data = Vec::with_capacity(16);
        data.extend_from_slice(&details.received_amount.to_be_bytes());
        data.extend_from_slice(&details.maximum_amount.to_be_bytes());
        Self {
            code: ErrorCode::AmountTooLarge,
            triggered_by,
            message: "Packet amount too large".to_string(),
            data,
        }
    }

    /// Ceiling details of an `F08` reject, if present and well formed.
    pub fn amount_too_large_details(&self) -> Option<AmountTooLarge> {
        if self.code != ErrorCode::AmountTooLarge || self.data.len() < 16 {
            return None;
        }
        let (received, rest) = self.data.split_at(8);
        let received_amount = u64::from_be_bytes(received.try_into().ok()?);
        let maximum_amount = u64::from_be_bytes(rest[..8].try_into().ok()?);
        Some(AmountTooLarge {
            received_amount,
            maximum_amount,
        })
    }
}

/// Outcome of a single prepare round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentResult {
    Fulfilled(Fulfill),
    Rejected(Reject),
}

impl PaymentResult {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }
}
