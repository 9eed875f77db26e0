use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use tracing::info;

/// Request headers parsed per request.
pub const MAX_REQUEST_HEADERS: usize = 32;

/// Wrapper around may_minihttp's HTTP server
///
/// Accepts up to 32 request headers: NGSI clients behind gateways routinely
/// send `Fiware-*`, `NGSILD-*`, forwarding and auth headers together.
pub struct HttpServer<T>(pub T);

/// Handle to a running broker.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listening address until a TCP connection succeeds.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` error if the server doesn't become ready within ~250ms (50 attempts × 5ms).
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting connections and wait for the accept coroutine to end.
    pub fn stop(self) {
        // SAFETY: the handle owns the accept coroutine, which is not running
        // anything else; cancelling it only stops accepting connections.
        #[allow(unsafe_code)]
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Block until the server coroutine finishes.
    ///
    /// # Errors
    ///
    /// Returns an error if the server coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind `addr` and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the port cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = HttpServerWithHeaders::<_, MAX_REQUEST_HEADERS>(self.0).start(addr)?;
        info!(%addr, "Broker listening");
        Ok(ServerHandle { addr, handle })
    }
}
