//! Newline-delimited TCP transport using `tokio::net`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Longest inbound line accepted, in bytes, terminator excluded.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Transport`] that listens for incoming line-oriented clients.
pub struct TcpLineTransport {
    listener: TcpListener,
}

impl TcpLineTransport {
    /// Binds a new transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP line transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpLineTransport {
    type Connection = TcpLineConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let conn = TcpLineConnection::from_stream(stream, addr);
        tracing::debug!(id = %conn.id, %addr, "accepted TCP connection");
        Ok(conn)
    }
}

/// A single TCP connection carrying newline-terminated lines.
///
/// The read and write halves sit behind separate locks: a reader task
/// parked in `recv` never blocks a writer task.
pub struct TcpLineConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    reader: Mutex<LineReader>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpLineConnection {
    fn from_stream(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        // Chat lines are tiny; waiting for Nagle only adds latency.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer_addr, error = %e, "set_nodelay failed");
        }
        let (read_half, write_half) = stream.into_split();
        Self {
            id: ConnectionId::new(
                NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            ),
            peer_addr,
            reader: Mutex::new(LineReader {
                inner: BufReader::new(read_half),
                pending: Vec::new(),
            }),
            writer: Mutex::new(write_half),
        }
    }

    /// Returns the remote address of this connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// Buffered read half plus the bytes of a line not yet completed.
///
/// `pending` outlives each `recv` call, so a cancelled read resumes where
/// it stopped.
struct LineReader {
    inner: BufReader<OwnedReadHalf>,
    pending: Vec<u8>,
}

impl LineReader {
    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        // One byte past the limit is enough to tell an overlong line apart.
        let budget = (MAX_LINE_LENGTH + 2).saturating_sub(self.pending.len()) as u64;
        let n = (&mut self.inner)
            .take(budget)
            .read_until(b'\n', &mut self.pending)
            .await
            .map_err(TransportError::ReceiveFailed)?;

        let terminated = self.pending.last() == Some(&b'\n');
        if n == 0 && self.pending.is_empty() {
            return Ok(None);
        }

        let mut bytes = std::mem::take(&mut self.pending);
        if terminated {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        if bytes.len() > MAX_LINE_LENGTH {
            return Err(TransportError::LineTooLong(MAX_LINE_LENGTH));
        }

        String::from_utf8(bytes).map(Some).map_err(|e| {
            TransportError::ReceiveFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            ))
        })
    }
}

impl Connection for TcpLineConnection {
    type Error = TransportError;

    async fn send(&self, line: &str) -> Result<(), Self::Error> {
        if line.contains('\n') {
            return Err(TransportError::InvalidLine);
        }
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(framed.as_bytes())
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        self.reader.lock().await.next_line().await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
