//! Transport bindings.
//!
//! Both bindings satisfy the same contract: deliver raw call bytes to
//! [`Server::call_function`](crate::Server::call_function) and carry the
//! raw reply back to the client that issued the call. Within one
//! connection, request/response pairs are strictly ordered; connections are
//! independent of each other.

pub mod ipc;
pub mod stream;

use crate::async_client::{AsyncTransport, PendingCall};
use crate::client::Transport;
use crate::error::TransportError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task;

/// Adapts any blocking-exchange [`Transport`] into an [`AsyncTransport`]
/// by running each exchange on a spawned task. The connection lock keeps
/// one call outstanding at a time, so replies cannot cross.
pub struct Spawned<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Spawned<T> {
    pub fn new(transport: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
        }
    }
}

impl<T: Transport + 'static> AsyncTransport for Spawned<T> {
    fn async_send(&mut self, fcall: Vec<u8>, pending: PendingCall) -> Result<(), TransportError> {
        let inner = self.inner.clone();
        task::spawn(async move {
            let mut transport = inner.lock().await;
            match transport.send(&fcall).await {
                Ok(reply) => pending.complete(Ok(&reply)),
                Err(e) => pending.complete(Err(&e.to_string())),
            }
        });
        Ok(())
    }
}
