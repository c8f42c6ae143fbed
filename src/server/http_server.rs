use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

/// Wrapper around may_minihttp's HTTP server.
///
/// Uses 32 max headers to handle modern API gateway/proxy traffic.
pub struct HttpServer<T>(pub T);

/// Handle to a running HTTP server.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Wait for the server to accept connections.
    ///
    /// Polls the bound address with TCP connects; useful in tests to make
    /// sure the server is up before sending requests.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop the server and wait for its coroutine to finish.
    pub fn stop(self) {
        // SAFETY: cancel() is marked unsafe by the may runtime. The handle
        // is valid (we hold it) and cancellation is the intended shutdown
        // path.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Block until the server coroutine finishes.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Start the HTTP server on the given address.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = HttpServerWithHeaders::<_, 32>(self.0).start(addr)?;
        Ok(ServerHandle { addr, handle })
    }
}
