use crate::application::pending::PendingTable;
use crate::domain::address::Address;
use crate::domain::packet::{Fulfill, Reject};
use crate::domain::ports::IncomingHandler;
use crate::error::Result;
use crate::interfaces::json::packet_codec::{self, Packet};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Inbound handler that resolves looped-back prepares against the pending table.
pub struct LoopbackResponder {
    address: Address,
    pending: PendingTable,
}

impl LoopbackResponder {
    pub fn new(address: Address, pending: PendingTable) -> Self {
        Self { address, pending }
    }

    async fn respond(&self, request: &[u8]) -> Packet {
        let prepare = match packet_codec::decode_prepare(request) {
            Ok(prepare) => prepare,
            Err(e) => {
                warn!(error = %e, "Rejecting undecodable inbound packet");
                return Packet::Reject(Reject::invalid_packet(
                    self.address.clone(),
                    e.to_string(),
                ));
            }
        };

        let condition = prepare.execution_condition;
        let Some(entry) = self.pending.take(&condition) else {
            debug!(%condition, "No pending payment for condition");
            return Packet::Reject(Reject::insufficient_destination_amount(
                self.address.clone(),
            ));
        };

        if entry.policy.authorize(prepare.amount).await {
            debug!(%condition, amount = prepare.amount, "Fulfilling loopback payment");
            Packet::Fulfill(Fulfill {
                fulfillment: entry.fulfillment,
                data: Vec::new(),
            })
        } else {
            debug!(%condition, amount = prepare.amount, "Loopback payment declined");
            Packet::Reject(Reject::insufficient_destination_amount(
                self.address.clone(),
            ))
        }
    }
}

#[async_trait]
impl IncomingHandler for LoopbackResponder {
    async fn handle(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        let response = self.respond(&request).await;
        packet_codec::encode(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hash_lock::{Condition, Fulfillment};
    use crate::domain::packet::{ErrorCode, PaymentResult, Prepare};
    use chrono::Utc;
    use std::sync::Arc;

    fn address() -> Address {
        Address::new("test.example.alice").unwrap()
    }

    fn prepare_bytes(amount: u64, condition: Condition) -> Vec<u8> {
        packet_codec::encode(&Packet::Prepare(Prepare {
            amount,
            expires_at: Utc::now(),
            execution_condition: condition,
            destination: address(),
            data: vec![],
        }))
        .unwrap()
    }

    async fn handle(responder: &LoopbackResponder, request: Vec<u8>) -> PaymentResult {
        let response = responder.handle(request).await.unwrap();
        packet_codec::decode_payment_result(&response).unwrap()
    }

    #[tokio::test]
    async fn test_fulfills_with_stored_secret() {
        let pending = PendingTable::new();
        let responder = LoopbackResponder::new(address(), pending.clone());
        let fulfillment = Fulfillment::random();
        let _guard = pending.register(fulfillment, Arc::new(|amount: u64| amount == 15));

        match handle(&responder, prepare_bytes(15, fulfillment.condition())).await {
            PaymentResult::Fulfilled(fulfill) => {
                assert!(fulfill.fulfillment.fulfills(&fulfillment.condition()));
                assert!(fulfill.data.is_empty());
            }
            other => panic!("expected fulfill, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_declined_payment_is_rejected() {
        let pending = PendingTable::new();
        let responder = LoopbackResponder::new(address(), pending.clone());
        let fulfillment = Fulfillment::random();
        let _guard = pending.register(fulfillment, Arc::new(|_: u64| false));

        let result = handle(&responder, prepare_bytes(25, fulfillment.condition())).await;
        assert_eq!(
            result,
            PaymentResult::Rejected(Reject::insufficient_destination_amount(address()))
        );
    }

    #[tokio::test]
    async fn test_unknown_and_resolved_conditions_are_rejected() {
        let pending = PendingTable::new();
        let responder = LoopbackResponder::new(address(), pending.clone());

        for amount in [0, 1, u64::MAX] {
            let result =
                handle(&responder, prepare_bytes(amount, Fulfillment::random().condition())).await;
            assert!(matches!(
                result,
                PaymentResult::Rejected(ref r) if r.code == ErrorCode::InsufficientDestinationAmount
            ));
        }

        let fulfillment = Fulfillment::random();
        let _guard = pending.register(fulfillment, Arc::new(|_: u64| true));
        let first = handle(&responder, prepare_bytes(5, fulfillment.condition())).await;
        assert!(first.is_fulfilled());
        assert!(pending.is_empty());

        let replay = handle(&responder, prepare_bytes(5, fulfillment.condition())).await;
        assert_eq!(
            replay,
            PaymentResult::Rejected(Reject::insufficient_destination_amount(address()))
        );
    }

    #[tokio::test]
    async fn test_garbage_is_rejected_not_fatal() {
        let responder = LoopbackResponder::new(address(), PendingTable::new());
        match handle(&responder, b"garbage".to_vec()).await {
            PaymentResult::Rejected(reject) => {
                assert_eq!(reject.code, ErrorCode::InvalidPacket);
                assert_eq!(reject.triggered_by, address());
            }
            other => panic!("expected reject, got {:?}", other),
        }
    }
}
