use crate::error::{LoopError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Routable address of a node, as learned from the address-discovery handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(LoopError::Validation(format!(
                "invalid address {:?}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = LoopError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account details handed out by the address-discovery handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Address packets must be sent to in order to reach this node.
    pub client_address: Address,
    /// Asset the inbound account is denominated in.
    pub asset_code: String,
    /// Number of decimal places of one asset unit.
    pub asset_scale: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(Address::new("test.example.alice").is_ok());
        assert!(matches!(Address::new(""), Err(LoopError::Validation(_))));
        assert!(matches!(
            Address::new("test alice"),
            Err(LoopError::Validation(_))
        ));
    }

    #[test]
    fn test_address_deserialization_validates() {
        let ok: Address = serde_json::from_str("\"g.node\"").unwrap();
        assert_eq!(ok.as_str(), "g.node");
        assert!(serde_json::from_str::<Address>("\"\"").is_err());
    }
}
