//! Length-prefixed stream transport.
//!
//! Each message is a 2-byte big-endian length followed by that many payload
//! bytes. A payload larger than 65535 bytes cannot be framed and is
//! rejected on send; a zero-byte read at a frame boundary is clean EOF.
//! One connection carries one call at a time, head-to-tail.

use crate::client::Transport;
use crate::error::TransportError;
use crate::server::Server;
use futures::future::BoxFuture;
use std::io::{self, ErrorKind};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task;
use tracing::{debug, warn};

/// Largest framable payload: the length prefix is 16 bits.
pub const MAX_FRAME: usize = u16::MAX as usize;

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME {
        return Err(TransportError::FrameTooLarge(payload.len(), MAX_FRAME));
    }
    writer.write_all(&(payload.len() as u16).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. `Ok(None)` is clean EOF (the peer closed between
/// frames); EOF inside a frame is an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u16::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Client side of the stream transport.
pub struct StreamTransport {
    stream: BufStream<TcpStream>,
}

impl StreamTransport {
    pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Ok(Self::from_stream(TcpStream::connect(addr).await?))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: BufStream::new(stream),
        }
    }
}

impl Transport for StreamTransport {
    fn send<'a>(&'a mut self, fcall: &'a [u8]) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        Box::pin(async move {
            write_frame(&mut self.stream, fcall).await?;
            read_frame(&mut self.stream)
                .await?
                .ok_or(TransportError::Closed)
        })
    }
}

/// Serves one service over a TCP listener: accept, then one task per
/// connection looping read-dispatch-write until the peer goes away.
pub async fn serve_stream(
    server: Arc<Server>,
    service: impl Into<String>,
    listener: TcpListener,
) -> io::Result<()> {
    let service = service.into();
    loop {
        let (sock, addr) = listener.accept().await?;
        debug!(%addr, "accepted stream connection");
        let server = server.clone();
        let service = service.clone();
        task::spawn(async move {
            let mut stream = BufStream::new(sock);
            loop {
                let call = match read_frame(&mut stream).await {
                    Ok(Some(call)) => call,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(%addr, error = %e, "failed to read rpc request");
                        break;
                    }
                };
                let reply = server.call_function(&service, &call);
                if let Err(e) = write_frame(&mut stream, &reply).await {
                    warn!(%addr, error = %e, "failed to send rpc response");
                    break;
                }
            }
            debug!(%addr, "stream connection closed");
        });
    }
}
