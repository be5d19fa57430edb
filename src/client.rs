//! Synchronous (one-call-at-a-time) client.
//!
//! A [`Client`] glues the call encoder to a transport's send/receive step
//! and the reply decoders. Exactly one call is in flight per client handle;
//! there is no pipelining and no queue. A transport that yields no reply
//! surfaces as the fixed error 500 "Transport Error".

use crate::error::{RpcError, TransportError};
use crate::fcall::{fcall, CallArgs};
use crate::fret;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// One blocking request/response exchange: deliver the call bytes, return
/// the raw reply bytes.
pub trait Transport: Send {
    fn send<'a>(&'a mut self, fcall: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, TransportError>>;
}

pub struct Client {
    transport: Box<dyn Transport>,
}

impl Client {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    async fn roundtrip(&mut self, fname: &str, args: impl CallArgs) -> Result<Vec<u8>, RpcError> {
        let call = fcall(fname, args);
        match self.transport.send(&call).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                debug!(fname, error = %e, "transport send failed");
                Err(RpcError::transport())
            }
        }
    }

    pub async fn call_int(&mut self, fname: &str, args: impl CallArgs) -> Result<i32, RpcError> {
        fret::fret_int(&self.roundtrip(fname, args).await?)
    }

    pub async fn call_int64(&mut self, fname: &str, args: impl CallArgs) -> Result<i64, RpcError> {
        fret::fret_int64(&self.roundtrip(fname, args).await?)
    }

    pub async fn call_string(
        &mut self,
        fname: &str,
        args: impl CallArgs,
    ) -> Result<Option<String>, RpcError> {
        fret::fret_string(&self.roundtrip(fname, args).await?)
    }

    pub async fn call_object<T: DeserializeOwned>(
        &mut self,
        fname: &str,
        args: impl CallArgs,
    ) -> Result<Option<T>, RpcError> {
        fret::fret_object(&self.roundtrip(fname, args).await?)
    }

    pub async fn call_objlist<T: DeserializeOwned>(
        &mut self,
        fname: &str,
        args: impl CallArgs,
    ) -> Result<Vec<T>, RpcError> {
        fret::fret_objlist(&self.roundtrip(fname, args).await?)
    }

    pub async fn call_json(&mut self, fname: &str, args: impl CallArgs) -> Result<Value, RpcError> {
        fret::fret_json(&self.roundtrip(fname, args).await?)
    }
}
