use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),
    #[error("Unexpected packet: expected {0}")]
    UnexpectedPacket(&'static str),
    #[error("Address discovery failed: {0}")]
    Discovery(String),
    #[error("Fulfillment does not match the execution condition")]
    FulfillmentMismatch,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoopError>;
