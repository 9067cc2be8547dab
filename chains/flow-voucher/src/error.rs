//! Error types for the voucher minter pool
//!
//! Three layers, matching the three components:
//!
//! - [`ClientError`]: failures reported by a single pooled client (network,
//!   chain rejection, decoding, lifecycle misuse)
//! - [`PoolError`]: slot allocation and bounded-acquisition failures
//! - [`MinterError`]: the single surface callers of
//!   [`VoucherMinterPool`](crate::VoucherMinterPool) match on

use core_logic::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`VoucherClient`](crate::VoucherClient).
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("access node returned {status} for {endpoint}: {body}")]
    Status {
        status: u16,
        endpoint: String,
        body: String,
    },

    #[error("invalid access endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("transaction {transaction_id} failed on chain: {message}")]
    Execution {
        transaction_id: String,
        message: String,
    },

    #[error("transaction {transaction_id} not sealed yet (status: {status})")]
    NotSealed {
        transaction_id: String,
        status: String,
    },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no transaction signer configured")]
    SignerUnavailable,

    #[error("transaction signing failed: {0}")]
    Signer(String),

    #[error("client for key index {key_index} is closed")]
    Closed { key_index: u32 },

    #[error("client for key index {key_index} was already closed")]
    AlreadyClosed { key_index: u32 },

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl ClientError {
    pub fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        ClientError::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// Slot allocation and bounded-acquisition failures.
#[derive(Error, Debug)]
pub enum PoolError {
    /// No free key index when a client had to be created.
    #[error("key pool exhausted: all {capacity} key slots are in use")]
    Exhausted { capacity: u32 },

    /// No client became available within the acquire timeout.
    #[error("timed out after {waited:?} waiting for a pooled client")]
    AcquireTimeout { waited: Duration },

    #[error("client pool is closed")]
    Closed,

    #[error("invalid key range: start {start}, capacity {capacity}")]
    InvalidKeyRange { start: u32, capacity: u32 },

    /// A key index was handed back that is not currently allocated.
    #[error("key index {key_index} is not currently allocated")]
    SlotNotAllocated { key_index: u32 },

    #[error("failed to connect client for key index {key_index}: {source}")]
    Connect {
        key_index: u32,
        #[source]
        source: ClientError,
    },

    #[error("newly created client for key index {key_index} failed validation")]
    CreateValidation { key_index: u32 },

    #[error("invalid pool configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Error surface of [`VoucherMinterPool`](crate::VoucherMinterPool).
#[derive(Error, Debug)]
pub enum MinterError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("{operation} failed on key index {key_index}: {source}")]
    OperationFailed {
        operation: &'static str,
        key_index: u32,
        #[source]
        source: ClientError,
    },

    /// Submission returned without a transaction id.
    #[error("{operation} returned an empty transaction id")]
    EmptyTransactionId { operation: &'static str },

    #[error("transaction {transaction_id} resolved without any minted voucher")]
    NothingMinted { transaction_id: String },

    /// Submitted, but the outcome could not be read back. The transaction
    /// may still seal; resolve it again with its id.
    #[error("transaction {transaction_id} submitted on key index {key_index} but not resolved: {source}")]
    Unresolved {
        transaction_id: String,
        key_index: u32,
        #[source]
        source: ClientError,
    },
}

impl MinterError {
    /// True when the pool was saturated for the whole acquire timeout.
    pub fn is_acquire_timeout(&self) -> bool {
        matches!(self, MinterError::Pool(PoolError::AcquireTimeout { .. }))
    }

    /// True when the pool has been shut down.
    pub fn is_closed(&self) -> bool {
        matches!(self, MinterError::Pool(PoolError::Closed))
    }

    /// The client-level cause, if the failure came from a pooled client.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            MinterError::OperationFailed { source, .. } => Some(source),
            MinterError::Unresolved { source, .. } => Some(source),
            MinterError::Pool(PoolError::Connect { source, .. }) => Some(source),
            _ => None,
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
pub type MinterResult<T> = Result<T, MinterError>;
