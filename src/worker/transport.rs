//! Length-delimited frames over TCP or a Unix socket.

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::errors::WorkerError;
use crate::worker::endpoint::Endpoint;

/// Largest frame accepted or sent. Larger responses are replaced by a `400` before sending.
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Any byte stream a frame connection can run over.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Connection for T {}

pub type FramedConnection = Framed<Box<dyn Connection>, LengthDelimitedCodec>;

pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder().max_frame_length(MAX_FRAME_LEN).new_codec()
}

pub fn framed<C: Connection + 'static>(conn: C) -> FramedConnection {
    Framed::new(Box::new(conn) as Box<dyn Connection>, codec())
}

/// Connects to `endpoint`.
pub async fn connect(endpoint: &Endpoint) -> Result<FramedConnection, WorkerError> {
    let conn: Box<dyn Connection> = match endpoint {
        Endpoint::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port)).await?;
            stream.set_nodelay(true)?;
            Box::new(stream)
        }
        #[cfg(unix)]
        Endpoint::Ipc(path) => Box::new(tokio::net::UnixStream::connect(path).await?),
        #[cfg(not(unix))]
        Endpoint::Ipc(_) => return Err(WorkerError::InvalidEndpoint(endpoint.to_string())),
    };

    debug!("connected to {endpoint}");
    Ok(Framed::new(conn, codec()))
}
