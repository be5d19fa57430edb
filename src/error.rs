use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error code used for both "function not found" (server side) and
/// transport failures (client side).
pub const EC_TRANSPORT: i32 = 500;
pub const EC_SERVICE_NOT_FOUND: i32 = 501;
pub const EC_BAD_REPLY: i32 = 502;
pub const EC_BAD_OBJ_LIST: i32 = 503;
pub const EC_BAD_CALL: i32 = 511;

pub const TRANSPORT_ERROR_MSG: &str = "Transport Error";

/// The one failure shape visible to RPC callers, mirroring the wire
/// `err_code`/`err_msg` pair. Application functions report failure with an
/// arbitrary code and message of their choosing; dispatch and decode
/// failures use the fixed `EC_*` codes.
#[derive(Serialize, Deserialize, Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn transport() -> Self {
        Self::new(EC_TRANSPORT, TRANSPORT_ERROR_MSG)
    }

    pub(crate) fn bad_reply(message: impl Into<String>) -> Self {
        Self::new(EC_BAD_REPLY, message)
    }

    pub(crate) fn bad_call(message: impl Into<String>) -> Self {
        Self::new(EC_BAD_CALL, message)
    }
}

/// Failures of [`Server::register_function`](crate::Server::register_function).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("no service with given name")]
    ServiceNotFound,

    #[error("no marshal registered for given signature")]
    UnknownSignature,
}

/// I/O-level failure produced by a concrete transport. Converted to
/// [`RpcError::transport`] where it crosses into the client call path.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {0} bytes exceeds the {1}-byte frame limit")]
    FrameTooLarge(usize, usize),

    #[error("envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("peer closed the connection")]
    Closed,
}
