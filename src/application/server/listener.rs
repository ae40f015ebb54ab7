use crate::application::server::session::Session;
use crate::common::error::{Result, ServerError};
use std::net::{SocketAddr, TcpListener};

/// Listener owns the accepting socket; accepts block the calling thread
pub struct Listener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl Listener {
    /// Create a new listener bound to the given address
    pub fn new(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| ServerError::NetworkError(format!("Failed to bind to {}: {}", addr, e)))?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    /// Wait for the next client connection
    pub fn accept(&self) -> Result<Session> {
        match self.listener.accept() {
            Ok((stream, peer)) => Session::new(stream, peer),
            Err(e) => Err(ServerError::NetworkError(format!(
                "Failed to accept connection: {}",
                e
            ))),
        }
    }

    /// Get the socket address this listener is bound to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}
