//! Socket abstraction underneath the framed connection.
//!
//! The connection owns framing and backoff policy only; actual byte
//! transport is behind [`Connector`], so tests can run the full connection
//! state machine over in-memory pipes.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Marker trait for duplex byte streams usable as a connection socket.
pub trait Socket: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Socket for T {}

/// A connected socket, type-erased.
pub type BoxedSocket = Box<dyn Socket>;

/// Opens sockets to an endpoint. One implementation per platform /
/// test harness.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a duplex stream to `address:port`.
    async fn connect(&self, address: &str, port: u16) -> io::Result<BoxedSocket>;
}

/// TCP connector with Nagle disabled; latency matters more than
/// throughput for the small control packets this protocol favors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &str, port: u16) -> io::Result<BoxedSocket> {
        let stream = TcpStream::connect((address, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}
