use crate::domain::address::AccountInfo;
use crate::domain::packet::{Fulfill, PaymentResult, Prepare, Reject};
use crate::error::{LoopError, Result};
use serde::{Deserialize, Serialize};

/// Every message that crosses a transport, tagged by its `type` field.
///
/// Amounts are decimal strings, conditions, fulfillments and opaque data are
/// hex, and expiry is an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    Prepare(Prepare),
    Fulfill(Fulfill),
    Reject(Reject),
    AddressRequest,
    AddressResponse(AccountInfo),
}

pub fn encode(packet: &Packet) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(packet)?)
}

pub fn decode(bytes: &[u8]) -> Result<Packet> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn decode_prepare(bytes: &[u8]) -> Result<Prepare> {
    match decode(bytes)? {
        Packet::Prepare(prepare) => Ok(prepare),
        _ => Err(LoopError::UnexpectedPacket("prepare")),
    }
}

pub fn decode_payment_result(bytes: &[u8]) -> Result<PaymentResult> {
    match decode(bytes)? {
        Packet::Fulfill(fulfill) => Ok(PaymentResult::Fulfilled(fulfill)),
        Packet::Reject(reject) => Ok(PaymentResult::Rejected(reject)),
        _ => Err(LoopError::UnexpectedPacket("fulfill or reject")),
    }
}

pub fn decode_account_info(bytes: &[u8]) -> Result<AccountInfo> {
    match decode(bytes)? {
        Packet::AddressResponse(info) => Ok(info),
        Packet::Reject(reject) => Err(LoopError::Discovery(format!(
            "{} from {}: {}",
            reject.code, reject.triggered_by, reject.message
        ))),
        _ => Err(LoopError::UnexpectedPacket("address response")),
    }
}
