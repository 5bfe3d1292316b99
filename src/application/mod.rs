//! Application layer: the payment loop and its chunk scheduler.
//!
//! `PaymentLoop` sends prepares out through one transport and answers them when
//! they come back in on another. Shared state (the pending table and the chunk
//! scheduler's counters) sits behind `parking_lot` mutexes that are never held
//! across an await point.

pub mod chunked;
pub mod payment_loop;
pub mod pending;
pub mod responder;
