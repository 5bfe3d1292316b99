#![allow(dead_code)]

use payloop::application::payment_loop::PaymentLoop;
use payloop::domain::address::{AccountInfo, Address};
use payloop::domain::ports::HandlerArc;
use payloop::infrastructure::in_memory::InMemoryTransport;
use payloop::infrastructure::simulated_path::{AddressAuthority, SimulatedPath};
use std::sync::Arc;
use std::time::Duration;

pub const LOOP_ADDRESS: &str = "test.example.alice";
pub const PATH_ADDRESS: &str = "test.example.connector";

pub struct Network {
    pub payment_loop: PaymentLoop,
    pub outbound: Arc<InMemoryTransport>,
    pub inbound: Arc<InMemoryTransport>,
}

pub fn loop_address() -> Address {
    Address::new(LOOP_ADDRESS).unwrap()
}

/// Inbound transport whose parent answers discovery with `LOOP_ADDRESS`.
pub fn inbound_transport() -> Arc<InMemoryTransport> {
    let inbound = Arc::new(InMemoryTransport::new());
    inbound.connect_remote(Arc::new(AddressAuthority::new(AccountInfo {
        client_address: loop_address(),
        asset_code: "XRP".to_string(),
        asset_scale: 9,
    })));
    inbound
}

/// Builds a loop whose outbound packets travel through a simulated path
/// configured by `configure` before arriving on the inbound transport.
pub async fn loopback(
    latency: Duration,
    configure: impl FnOnce(SimulatedPath) -> SimulatedPath,
) -> Network {
    let inbound = inbound_transport();
    let path = configure(SimulatedPath::new(
        Address::new(PATH_ADDRESS).unwrap(),
        inbound.clone(),
    ));
    loopback_through(latency, Arc::new(path), inbound).await
}

/// Builds a loop whose outbound packets are handed to `remote`.
pub async fn loopback_through(
    latency: Duration,
    remote: HandlerArc,
    inbound: Arc<InMemoryTransport>,
) -> Network {
    let outbound = Arc::new(InMemoryTransport::with_latency(latency));
    outbound.connect_remote(remote);
    let payment_loop = PaymentLoop::connect(outbound.clone(), inbound.clone())
        .await
        .unwrap();
    Network {
        payment_loop,
        outbound,
        inbound,
    }
}
