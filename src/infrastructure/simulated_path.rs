//! Stand-ins for the network outside the node: a forwarding path that can
//! change amounts and enforce a liquidity ceiling, and the parent that answers
//! address discovery.

use crate::domain::address::{AccountInfo, Address};
use crate::domain::packet::{AmountTooLarge, ErrorCode, Reject};
use crate::domain::ports::{HandlerArc, IncomingHandler};
use crate::error::Result;
use crate::interfaces::json::packet_codec::{self, Packet};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

/// Forwards prepares to `next_hop`, converting the amount on the way.
///
/// The forwarded amount is `floor(amount * rate) + delta`, saturating at zero.
pub struct SimulatedPath {
    address: Address,
    next_hop: HandlerArc,
    rate: Decimal,
    delta: i64,
    max_packet_amount: Option<u64>,
}

impl SimulatedPath {
    pub fn new(address: Address, next_hop: HandlerArc) -> Self {
        Self {
            address,
            next_hop,
            rate: Decimal::ONE,
            delta: 0,
            max_packet_amount: None,
        }
    }

    pub fn with_rate(mut self, rate: Decimal) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_delta(mut self, delta: i64) -> Self {
        self.delta = delta;
        self
    }

    /// Rejects prepares above `max` with an amount-too-large reject.
    pub fn with_max_packet_amount(mut self, max: u64) -> Self {
        self.max_packet_amount = Some(max);
        self
    }

    fn forwarded_amount(&self, amount: u64) -> u64 {
        let converted = (Decimal::from(amount) * self.rate)
            .floor()
            .to_i128()
            .unwrap_or(0);
        (converted + i128::from(self.delta)).clamp(0, i128::from(u64::MAX)) as u64
    }

    fn reject(&self, code: ErrorCode, message: &str) -> Result<Vec<u8>> {
        packet_codec::encode(&Packet::Reject(Reject {
            code,
            triggered_by: self.address.clone(),
            message: message.to_string(),
            data: Vec::new(),
        }))
    }
}

#[async_trait]
impl IncomingHandler for SimulatedPath {
    async fn handle(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        let mut prepare = match packet_codec::decode_prepare(&request) {
            Ok(prepare) => prepare,
            Err(e) => return self.reject(ErrorCode::InvalidPacket, &e.to_string()),
        };

        if prepare.expires_at <= Utc::now() {
            return self.reject(ErrorCode::Other("R00".to_string()), "Transfer timed out");
        }

        if let Some(maximum_amount) = self.max_packet_amount
            && prepare.amount > maximum_amount
        {
            debug!(amount = prepare.amount, maximum_amount, "Prepare above liquidity ceiling");
            return packet_codec::encode(&Packet::Reject(Reject::amount_too_large(
                self.address.clone(),
                AmountTooLarge {
                    received_amount: prepare.amount,
                    maximum_amount,
                },
            )));
        }

        prepare.amount = self.forwarded_amount(prepare.amount);
        self.next_hop
            .handle(packet_codec::encode(&Packet::Prepare(prepare))?)
            .await
    }
}

/// Answers address-discovery requests with a fixed account.
pub struct AddressAuthority {
    account: AccountInfo,
}

impl AddressAuthority {
    pub fn new(account: AccountInfo) -> Self {
        Self { account }
    }
}

#[async_trait]
impl IncomingHandler for AddressAuthority {
    async fn handle(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        let response = match packet_codec::decode(&request) {
            Ok(Packet::AddressRequest) => Packet::AddressResponse(self.account.clone()),
            _ => Packet::Reject(Reject::invalid_packet(
                self.account.client_address.clone(),
                "expected an address request",
            )),
        };
        packet_codec::encode(&response)
    }
}
