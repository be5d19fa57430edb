//! Local IPC transport over a Unix domain socket.
//!
//! Frames are a 4-byte native-endian length followed by the payload. A
//! request payload wraps the call envelope in
//! `{"service": ..., "request": "<call bytes>"}` so one socket can host
//! several services; a response payload is the raw reply envelope with no
//! extra wrapping.
//!
//! The server runs one task per accepted connection with no connection
//! cap, which is adequate for the expected local-client concurrency; a
//! bounded pool or a multiplexing reactor is the known scaling escape
//! hatch.

use crate::client::Transport;
use crate::error::TransportError;
use crate::server::Server;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::{UnixListener, UnixStream};
use tokio::task;
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct IpcRequest {
    service: String,
    request: String,
}

async fn write_ipc_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&(payload.len() as u32).to_ne_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_ipc_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_ne_bytes(len_buf) as usize;
    if len == 0 {
        return Ok(None);
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Client side: one connection bound to one service name.
pub struct IpcTransport {
    stream: BufStream<UnixStream>,
    service: String,
}

impl IpcTransport {
    pub async fn connect(path: impl AsRef<Path>, service: impl Into<String>) -> io::Result<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self {
            stream: BufStream::new(stream),
            service: service.into(),
        })
    }
}

impl Transport for IpcTransport {
    fn send<'a>(&'a mut self, fcall: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        Box::pin(async move {
            let envelope = serde_json::to_vec(&IpcRequest {
                service: self.service.clone(),
                request: String::from_utf8_lossy(fcall).into_owned(),
            })?;
            write_ipc_frame(&mut self.stream, &envelope).await?;
            read_ipc_frame(&mut self.stream)
                .await?
                .ok_or(TransportError::Closed)
        })
    }
}

/// Server side: hosts every service of a [`Server`] on one socket path.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Binds the socket, deleting a stale socket file left by a previous
    /// run first.
    pub fn bind(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if path.exists() {
            debug!(path = %path.display(), "socket file exists, deleting it");
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept loop: one spawned handler task per connection.
    pub async fn serve(self, server: Arc<Server>) -> io::Result<()> {
        loop {
            let (stream, _) = self.listener.accept().await?;
            debug!("accepted ipc connection");
            let server = server.clone();
            task::spawn(handle_ipc_client(server, stream));
        }
    }
}

async fn handle_ipc_client(server: Arc<Server>, stream: UnixStream) {
    let mut stream = BufStream::new(stream);
    loop {
        let payload = match read_ipc_frame(&mut stream).await {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read rpc request");
                break;
            }
        };

        let req: IpcRequest = match serde_json::from_slice(&payload) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "malformed ipc request envelope");
                break;
            }
        };

        let reply = server.call_function(&req.service, req.request.as_bytes());
        if let Err(e) = write_ipc_frame(&mut stream, &reply).await {
            warn!(error = %e, "failed to send rpc response");
            break;
        }
    }
    debug!("ipc connection closed");
}
