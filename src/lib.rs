//! An RPC framework with signature-typed functions and a compact JSON wire
//! protocol.
//!
//! Servers register named functions under named services; each function's
//! (return-kind, parameter-kind) shape is fingerprinted into a
//! [`Signature`] that resolves, once, to the marshal shim handling its
//! calls. Clients encode `[fname, args...]` call envelopes, ship them over
//! a pluggable [`Transport`], and decode `{"ret": ...}` /
//! `{"err_code": ..., "err_msg": ...}` reply envelopes into typed results.
//! Two transport bindings ship in [`transport`]: a 2-byte length-prefixed
//! TCP stream and a Unix-domain-socket IPC channel that multiplexes
//! service names over one socket.

pub mod async_client;
pub mod client;
pub mod error;
pub mod fcall;
pub mod fret;
mod macros;
pub mod marshal;
pub mod native;
pub mod server;
pub mod signature;
pub mod transport;

pub use async_client::{AsyncCallback, AsyncClient, AsyncTransport, PendingCall, RetKind, RetValue};
pub use client::{Client, Transport};
pub use error::{RegisterError, RpcError, TransportError};
pub use fcall::{fcall, ArgValue, CallArgs};
pub use native::{NativeFn, NativeResult};
pub use server::{Server, SlowLogConfig};
pub use signature::{compute_signature, Signature};

// for macro-generated code
pub use serde_json;
