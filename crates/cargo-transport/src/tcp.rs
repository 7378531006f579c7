//! Frame-oriented TCP connection used by the RPC client and server.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::protocol::{Frame, FrameHeader, FRAME_HEADER_SIZE};

/// A TCP connection that sends and receives whole frames.
///
/// Reads and writes are independently serialized, so one task may block in
/// `recv_frame` while another sends.
pub struct TcpConnection {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    peer: String,
}

impl TcpConnection {
    /// Connects to `host:port`.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(stream))
    }

    /// Wraps an accepted stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        stream.set_nodelay(true).ok();
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            peer,
        }
    }

    /// Address of the remote peer, for logging.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Writes one frame (header then payload).
    pub async fn send_frame(&self, frame: &Frame) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame.header.to_bytes()).await?;
        writer.write_all(&frame.payload).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Reads one frame, validating the header.
    pub async fn recv_frame(&self) -> Result<Frame> {
        let mut reader = self.reader.lock().await;

        let mut header_buf = [0u8; FRAME_HEADER_SIZE];
        reader.read_exact(&mut header_buf).await?;
        let header = FrameHeader::from_bytes(&header_buf)?;

        let mut payload = vec![0u8; header.payload_length as usize];
        reader.read_exact(&mut payload).await?;

        Ok(Frame { header, payload })
    }
}
