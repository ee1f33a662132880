//! Blocking client for the companion store.

use super::protocol::{read_frame, write_frame, QueryResponse};
use crate::config::{Endpoint, QueryConfig};
use crate::error::Result;
use parking_lot::Mutex;
use std::io::{self, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Synchronous request/response exchange with the companion store.
///
/// Implementations never fail: transport faults are reported as a reply
/// whose status is not `ok`.
///
/// Closures can serve as clients, which is convenient in tests:
///
/// ```rust
/// use event_engine::query::{QueryClient, QueryResponse};
///
/// let client = |request: &str| QueryResponse::new(format!("ok {request}"));
/// assert!(client.query("ping").is_ok());
/// ```
pub trait QueryClient: Send + Sync {
    fn query(&self, request: &str) -> QueryResponse;
}

impl<F> QueryClient for F
where
    F: Fn(&str) -> QueryResponse + Send + Sync,
{
    fn query(&self, request: &str) -> QueryResponse {
        self(request)
    }
}

enum Stream {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Stream {
    fn set_read_timeout(&self, timeout: Duration) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.set_read_timeout(Some(timeout)),
            Stream::Tcp(stream) => stream.set_read_timeout(Some(timeout)),
        }
    }

    fn set_write_timeout(&self, timeout: Duration) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.set_write_timeout(Some(timeout)),
            Stream::Tcp(stream) => stream.set_write_timeout(Some(timeout)),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.set_nonblocking(nonblocking),
            Stream::Tcp(stream) => stream.set_nonblocking(nonblocking),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.read(buf),
            Stream::Tcp(stream) => stream.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.write(buf),
            Stream::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.flush(),
            Stream::Tcp(stream) => stream.flush(),
        }
    }
}

/// Socket whose reads and writes all share one exchange deadline.
///
/// Every call re-arms the socket timeout with the time left, so a store
/// that trickles bytes cannot stretch an exchange past its deadline.
struct DeadlineStream {
    stream: Stream,
    deadline: Instant,
    received: usize,
}

impl DeadlineStream {
    fn new(stream: Stream, deadline: Instant) -> Self {
        Self {
            stream,
            deadline,
            received: 0,
        }
    }

    /// Start a new exchange ending at `deadline`.
    fn arm(&mut self, deadline: Instant) {
        self.deadline = deadline;
        self.received = 0;
    }

    fn remaining(&self) -> io::Result<Duration> {
        match self.deadline.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(io::Error::new(io::ErrorKind::TimedOut, "exchange deadline passed")),
        }
    }
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.remaining()?;
        self.stream.set_read_timeout(left)?;
        let read = self.stream.read(buf)?;
        self.received += read;
        Ok(read)
    }
}

impl Write for DeadlineStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let left = self.remaining()?;
        self.stream.set_write_timeout(left)?;
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// One open connection. The reader buffer belongs to the connection so
/// nothing read ahead is lost between exchanges.
struct Connection {
    stream: BufReader<DeadlineStream>,
}

impl Connection {
    /// Whether an idle connection can still carry an exchange.
    ///
    /// The store may close a connection after any reply. A closed peer reads
    /// as end of stream, and unsolicited bytes mean the stream is out of
    /// step; either way the connection is unusable. Only "nothing to read
    /// yet" means alive.
    fn is_alive(&mut self) -> bool {
        if !self.stream.buffer().is_empty() {
            return false;
        }
        let stream = &mut self.stream.get_mut().stream;
        if stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut byte = [0u8; 1];
        let state = stream.read(&mut byte);
        if stream.set_nonblocking(false).is_err() {
            return false;
        }
        matches!(state, Err(err) if err.kind() == io::ErrorKind::WouldBlock)
    }

    /// True while no reply byte arrived during the current exchange.
    fn untouched(&self) -> bool {
        self.stream.get_ref().received == 0 && self.stream.buffer().is_empty()
    }
}

/// Companion store client over a stream socket.
///
/// Idle connections are pooled; an exchange checks one out exclusively, so
/// concurrent callers never interleave on a socket. A connection that saw
/// any error is dropped instead of returned to the pool.
///
/// One request gets one exchange, bounded as a whole by the configured
/// timeout (connecting included). The only second attempt is for a pooled
/// connection that turns out to have been closed by the store before any
/// part of the reply arrived: the request is then sent on a fresh
/// connection, within the same deadline. Any other failure is final.
pub struct SocketQueryClient {
    config: QueryConfig,
    idle: Mutex<Vec<Connection>>,
}

impl SocketQueryClient {
    pub fn new(config: QueryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            idle: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Number of pooled connections currently waiting for reuse.
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    /// Pop idle connections until one is still open.
    fn checkout_idle(&self) -> Option<Connection> {
        loop {
            let mut connection = self.idle.lock().pop()?;
            if connection.is_alive() {
                return Some(connection);
            }
            debug!(endpoint = %self.config.endpoint, "discarding closed pooled connection");
        }
    }

    fn checkin(&self, connection: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.config.pool_size {
            idle.push(connection);
        }
    }

    fn connect(&self, deadline: Instant) -> io::Result<Connection> {
        let stream = match &self.config.endpoint {
            #[cfg(unix)]
            Endpoint::Unix(path) => Stream::Unix(UnixStream::connect(path)?),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unix sockets are not available on this platform",
                ))
            }
            Endpoint::Tcp(addr) => Stream::Tcp(connect_tcp(addr, deadline)?),
        };
        debug!(endpoint = %self.config.endpoint, "connected to companion store");
        Ok(Connection {
            stream: BufReader::new(DeadlineStream::new(stream, deadline)),
        })
    }

    fn exchange(&self, connection: &mut Connection, request: &str, deadline: Instant) -> io::Result<String> {
        connection.stream.get_mut().arm(deadline);
        write_frame(connection.stream.get_mut(), self.config.framing, request)?;
        read_frame(
            &mut connection.stream,
            self.config.framing,
            self.config.max_response_bytes,
        )
    }

    fn send(&self, request: &str, deadline: Instant) -> io::Result<String> {
        if let Some(mut connection) = self.checkout_idle() {
            match self.exchange(&mut connection, request, deadline) {
                Ok(raw) => {
                    self.checkin(connection);
                    return Ok(raw);
                }
                Err(err) if connection.untouched() && is_disconnect(&err) => {
                    debug!(endpoint = %self.config.endpoint, error = %err, "pooled connection closed by store, reconnecting");
                }
                Err(err) => return Err(err),
            }
        }

        let mut connection = self.connect(deadline)?;
        let raw = self.exchange(&mut connection, request, deadline)?;
        self.checkin(connection);
        Ok(raw)
    }
}

impl QueryClient for SocketQueryClient {
    fn query(&self, request: &str) -> QueryResponse {
        let deadline = Instant::now() + self.config.timeout();
        match self.send(request, deadline) {
            Ok(raw) => QueryResponse::new(raw),
            Err(err) => {
                warn!(endpoint = %self.config.endpoint, error = %err, "companion store exchange failed");
                QueryResponse::error(describe(&err))
            }
        }
    }
}

impl std::fmt::Debug for SocketQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketQueryClient")
            .field("config", &self.config)
            .field("idle", &self.idle_connections())
            .finish()
    }
}

fn connect_tcp(addr: &str, deadline: Instant) -> io::Result<TcpStream> {
    let mut last_error = None;
    for socket_addr in addr.to_socket_addrs()? {
        let left = match deadline.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => left,
            _ => return Err(io::Error::new(io::ErrorKind::TimedOut, "connect deadline passed")),
        };
        match TcpStream::connect_timeout(&socket_addr, left) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("'{addr}' resolved to no address"))
    }))
}

/// The peer went away; nothing about the request itself.
fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

/// Reason text of the synthesized `err` reply.
fn describe(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => "timeout".to_string(),
        io::ErrorKind::UnexpectedEof => "connection closed".to_string(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
            format!("unavailable: {err}")
        }
        _ => err.to_string(),
    }
}
