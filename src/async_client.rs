//! Asynchronous (callback) client.
//!
//! An async call encodes its arguments, captures the expected result kind
//! and the user callback in a [`PendingCall`], and hands both to the
//! transport. The transport later feeds the raw reply (or a transport error
//! string) to [`PendingCall::complete`] — the single generic completion
//! entry point — on whatever thread or task suits it, so callbacks must be
//! `Send`. A `PendingCall` is consumed by value: completion, and the
//! release of the call state, happen exactly once by construction.

use crate::error::{RpcError, TransportError, EC_BAD_OBJ_LIST, EC_BAD_REPLY, EC_TRANSPORT};
use crate::fcall::{fcall, CallArgs};
use crate::fret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Which decoder the completion entry point applies. Chosen at the call
/// site; the reply bytes are not self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetKind {
    Int,
    Int64,
    String,
    Object,
    ObjList,
    Json,
}

/// Kind-erased decoded result handed to the stored callback.
#[derive(Debug, Clone, PartialEq)]
pub enum RetValue {
    Int(i32),
    Int64(i64),
    String(Option<String>),
    Object(Option<Value>),
    ObjList(Vec<Value>),
    Json(Value),
}

pub type AsyncCallback = Box<dyn FnOnce(Result<RetValue, RpcError>) + Send>;

/// The state of one outstanding async call.
pub struct PendingCall {
    kind: RetKind,
    callback: AsyncCallback,
}

impl PendingCall {
    pub fn new(kind: RetKind, callback: AsyncCallback) -> Self {
        Self { kind, callback }
    }

    /// Generic completion entry point. `reply` is the raw reply bytes, or
    /// the transport's error description if the exchange failed.
    pub fn complete(self, reply: Result<&[u8], &str>) {
        let result = match reply {
            Err(errstr) => Err(RpcError::new(
                EC_TRANSPORT,
                format!("Transport error: {errstr}"),
            )),
            Ok(data) => match self.kind {
                RetKind::Int => fret::fret_int(data).map(RetValue::Int),
                RetKind::Int64 => fret::fret_int64(data).map(RetValue::Int64),
                RetKind::String => fret::fret_string(data).map(RetValue::String),
                RetKind::Object => fret::fret_object::<Value>(data).map(RetValue::Object),
                RetKind::ObjList => fret::fret_objlist::<Value>(data).map(RetValue::ObjList),
                RetKind::Json => fret::fret_json(data).map(RetValue::Json),
            },
        };
        (self.callback)(result);
    }
}

/// Hands a call to the wire without blocking the caller. The transport owns
/// the [`PendingCall`] from here on and must eventually complete it.
pub trait AsyncTransport: Send {
    fn async_send(&mut self, fcall: Vec<u8>, pending: PendingCall) -> Result<(), TransportError>;
}

pub struct AsyncClient {
    transport: Box<dyn AsyncTransport>,
}

impl AsyncClient {
    pub fn new(transport: impl AsyncTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    fn start(
        &mut self,
        fname: &str,
        args: impl CallArgs,
        kind: RetKind,
        callback: AsyncCallback,
    ) -> Result<(), RpcError> {
        let call = fcall(fname, args);
        self.transport
            .async_send(call, PendingCall::new(kind, callback))
            .map_err(|e| {
                debug!(fname, error = %e, "async transport send failed");
                RpcError::transport()
            })
    }

    pub fn call_int(
        &mut self,
        fname: &str,
        args: impl CallArgs,
        callback: impl FnOnce(Result<i32, RpcError>) + Send + 'static,
    ) -> Result<(), RpcError> {
        self.start(
            fname,
            args,
            RetKind::Int,
            Box::new(move |res| {
                callback(res.and_then(|rv| match rv {
                    RetValue::Int(n) => Ok(n),
                    other => Err(kind_mismatch(&other)),
                }))
            }),
        )
    }

    pub fn call_int64(
        &mut self,
        fname: &str,
        args: impl CallArgs,
        callback: impl FnOnce(Result<i64, RpcError>) + Send + 'static,
    ) -> Result<(), RpcError> {
        self.start(
            fname,
            args,
            RetKind::Int64,
            Box::new(move |res| {
                callback(res.and_then(|rv| match rv {
                    RetValue::Int64(n) => Ok(n),
                    other => Err(kind_mismatch(&other)),
                }))
            }),
        )
    }

    pub fn call_string(
        &mut self,
        fname: &str,
        args: impl CallArgs,
        callback: impl FnOnce(Result<Option<String>, RpcError>) + Send + 'static,
    ) -> Result<(), RpcError> {
        self.start(
            fname,
            args,
            RetKind::String,
            Box::new(move |res| {
                callback(res.and_then(|rv| match rv {
                    RetValue::String(s) => Ok(s),
                    other => Err(kind_mismatch(&other)),
                }))
            }),
        )
    }

    pub fn call_object<T: DeserializeOwned>(
        &mut self,
        fname: &str,
        args: impl CallArgs,
        callback: impl FnOnce(Result<Option<T>, RpcError>) + Send + 'static,
    ) -> Result<(), RpcError> {
        self.start(
            fname,
            args,
            RetKind::Object,
            Box::new(move |res| {
                callback(res.and_then(|rv| match rv {
                    RetValue::Object(None) => Ok(None),
                    RetValue::Object(Some(v)) => serde_json::from_value(v).map(Some).map_err(|e| {
                        RpcError::new(EC_BAD_REPLY, format!("failed to decode ret object: {e}"))
                    }),
                    other => Err(kind_mismatch(&other)),
                }))
            }),
        )
    }

    pub fn call_objlist<T: DeserializeOwned>(
        &mut self,
        fname: &str,
        args: impl CallArgs,
        callback: impl FnOnce(Result<Vec<T>, RpcError>) + Send + 'static,
    ) -> Result<(), RpcError> {
        self.start(
            fname,
            args,
            RetKind::ObjList,
            Box::new(move |res| {
                callback(res.and_then(|rv| match rv {
                    RetValue::ObjList(vals) => vals
                        .into_iter()
                        .map(|v| {
                            serde_json::from_value(v).map_err(|e| {
                                RpcError::new(
                                    EC_BAD_OBJ_LIST,
                                    format!("failed to decode object list element: {e}"),
                                )
                            })
                        })
                        .collect(),
                    other => Err(kind_mismatch(&other)),
                }))
            }),
        )
    }

    pub fn call_json(
        &mut self,
        fname: &str,
        args: impl CallArgs,
        callback: impl FnOnce(Result<Value, RpcError>) + Send + 'static,
    ) -> Result<(), RpcError> {
        self.start(
            fname,
            args,
            RetKind::Json,
            Box::new(move |res| {
                callback(res.and_then(|rv| match rv {
                    RetValue::Json(v) => Ok(v),
                    other => Err(kind_mismatch(&other)),
                }))
            }),
        )
    }
}

fn kind_mismatch(got: &RetValue) -> RpcError {
    RpcError::new(EC_BAD_REPLY, format!("unexpected result kind: {got:?}"))
}
