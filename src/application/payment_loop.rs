use crate::application::pending::PendingTable;
use crate::application::responder::LoopbackResponder;
use crate::domain::address::{AccountInfo, Address};
use crate::domain::hash_lock::Fulfillment;
use crate::domain::packet::{PaymentResult, Prepare};
use crate::domain::ports::{ResolutionPolicy, TransportArc};
use crate::error::{LoopError, Result};
use crate::interfaces::json::packet_codec::{self, Packet};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Sends payments out through one transport and receives them back on another
/// transport of the same node.
///
/// Cloning is cheap and every clone drives the same pending table. The inbound
/// handler is deregistered once the last clone is dropped.
#[derive(Clone)]
pub struct PaymentLoop {
    inner: Arc<LoopInner>,
}

struct LoopInner {
    account: AccountInfo,
    outbound: TransportArc,
    inbound: TransportArc,
    pending: PendingTable,
}

impl Drop for LoopInner {
    fn drop(&mut self) {
        self.inbound.deregister_handler();
    }
}

impl PaymentLoop {
    /// Learns the loopback address over `inbound` and starts answering the
    /// prepares that arrive there.
    ///
    /// Address discovery happens exactly once, here. Any failure of the
    /// handshake, whether the send or the response, is a `LoopError::Discovery`.
    ///
    /// # Arguments
    ///
    /// * `outbound` - Transport prepares are sent out on.
    /// * `inbound` - Transport the looped prepares arrive on; also used for discovery.
    pub async fn connect(outbound: TransportArc, inbound: TransportArc) -> Result<Self> {
        let request = packet_codec::encode(&Packet::AddressRequest)?;
        let response = inbound
            .send(request)
            .await
            .map_err(|e| LoopError::Discovery(e.to_string()))?;
        let account = packet_codec::decode_account_info(&response).map_err(|e| match e {
            LoopError::Discovery(_) => e,
            other => LoopError::Discovery(other.to_string()),
        })?;
        info!(
            address = %account.client_address,
            asset_code = %account.asset_code,
            asset_scale = account.asset_scale,
            "Discovered loopback address"
        );

        let pending = PendingTable::new();
        inbound.register_handler(Arc::new(LoopbackResponder::new(
            account.client_address.clone(),
            pending.clone(),
        )));

        Ok(Self {
            inner: Arc::new(LoopInner {
                account,
                outbound,
                inbound,
                pending,
            }),
        })
    }

    pub fn address(&self) -> &Address {
        &self.inner.account.client_address
    }

    pub fn account(&self) -> &AccountInfo {
        &self.inner.account
    }

    /// Number of payments currently waiting for their loopback.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Sends one prepare of `source_amount` to this loop's own address and
    /// returns the fulfill or reject it resolved to.
    ///
    /// There is no retry and no local timeout. The pending entry is removed on
    /// every exit path, including a failed send.
    ///
    /// # Arguments
    ///
    /// * `source_amount` - Positive amount sent, in the outbound asset.
    /// * `expires_at` - Expiry communicated to the path; not enforced locally.
    /// * `policy` - Consulted with the amount that actually arrived on the
    ///   inbound side; the payment is fulfilled only if it returns true.
    pub async fn pay<P>(
        &self,
        source_amount: u64,
        expires_at: DateTime<Utc>,
        policy: P,
    ) -> Result<PaymentResult>
    where
        P: ResolutionPolicy + 'static,
    {
        if source_amount == 0 {
            return Err(LoopError::Validation(
                "source amount must be positive".to_string(),
            ));
        }

        let fulfillment = Fulfillment::random();
        let guard = self.inner.pending.register(fulfillment, Arc::new(policy));
        let condition = guard.condition();

        let request = packet_codec::encode(&Packet::Prepare(Prepare {
            amount: source_amount,
            expires_at,
            execution_condition: condition,
            destination: self.address().clone(),
            data: Vec::new(),
        }))?;

        debug!(%condition, source_amount, "Sending prepare");
        let response = self.inner.outbound.send(request).await;
        drop(guard);

        let result = packet_codec::decode_payment_result(&response?)?;
        if let PaymentResult::Fulfilled(fulfill) = &result
            && !fulfill.fulfillment.fulfills(&condition)
        {
            return Err(LoopError::FulfillmentMismatch);
        }
        Ok(result)
    }
}
