//! Individual vehicle session handling

use anyhow::Result;
use racecast_shared::{
    codec::{self, FrameDecoder},
    now_ms, Envelope,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::warn;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle to send messages to a specific vehicle
#[derive(Clone)]
pub struct SessionHandle {
    /// Distinguishes reconnects of the same vehicle
    pub session_id: u64,
    pub device_id: String,
    pub addr: SocketAddr,
    writer: Arc<Mutex<BoxedWriter>>,
}

impl SessionHandle {
    /// Send an envelope to this vehicle
    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        let encoded = codec::encode(envelope)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// A decoded frame together with the moment it was read
#[derive(Debug, Clone)]
pub struct Inbound {
    pub envelope: Envelope,
    pub received_at_ms: u64,
}

/// Active vehicle session
pub struct DeviceSession<R = ReadHalf<TcpStream>> {
    pub handle: SessionHandle,
    reader: R,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl DeviceSession {
    /// Create a new session from a TCP stream
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::from_parts(reader, Box::new(writer) as BoxedWriter, addr)
    }
}

impl<R: AsyncRead + Unpin> DeviceSession<R> {
    pub fn from_parts(reader: R, writer: BoxedWriter, addr: SocketAddr) -> Self {
        let handle = SessionHandle {
            session_id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            device_id: String::new(), // Set from the first header
            addr,
            writer: Arc::new(Mutex::new(writer)),
        };

        Self {
            handle,
            reader,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
        }
    }

    /// Get a cloneable handle for sending messages
    pub fn get_handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Read the next envelope from this session.
    /// Returns None once the connection is closed or the stream is corrupt.
    pub async fn recv(&mut self) -> Option<Inbound> {
        loop {
            match self.decoder.decode_next() {
                Ok(Some(envelope)) => {
                    let received_at_ms = now_ms();
                    if self.handle.device_id.is_empty() {
                        if let Some(header) = &envelope.header {
                            self.handle.device_id = header.device_id.clone();
                        }
                    }
                    return Some(Inbound {
                        envelope,
                        received_at_ms,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(addr = %self.handle.addr, "decode error, dropping session: {}", e);
                    return None;
                }
            }

            match self.reader.read(&mut self.read_buf).await {
                Ok(0) => return None,
                Ok(n) => self.decoder.extend(&self.read_buf[..n]),
                Err(e) => {
                    warn!(addr = %self.handle.addr, "read error: {}", e);
                    return None;
                }
            }
        }
    }

    /// Get the device ID (empty until the first message arrives)
    pub fn device_id(&self) -> &str {
        &self.handle.device_id
    }
}
