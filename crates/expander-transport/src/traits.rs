use tokio::io::{AsyncRead, AsyncWrite};

/// A connected duplex byte stream: anything `AsyncRead + AsyncWrite`.
///
/// Serial ports, TCP sockets and `tokio::io::duplex` pipes all qualify. The
/// stream is moved into the command channel task, hence the `Send + 'static`
/// bounds.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> DuplexStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased duplex stream.
pub type BoxedStream = Box<dyn DuplexStream>;
