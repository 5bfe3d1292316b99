//! Domain types and the ports the payment loop is wired through.

pub mod address;
pub mod hash_lock;
pub mod packet;
pub mod ports;
