use crate::common::constants::DEFAULT_BUFFER_SIZE;
use crate::common::error::{Result, ServerError};
use crate::core::net::fd::FileDescriptor;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Keep watching for more input
    Open,
    /// Peer went away or the connection broke
    Closed,
}

/// One accepted client of the echo server
#[derive(Debug)]
pub struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    echoed: usize,
}

impl Session {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Result<Self> {
        FileDescriptor::new(stream.as_raw_fd()).set_non_blocking()?;
        Ok(Self {
            stream,
            peer,
            echoed: 0,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    /// Bytes echoed back so far
    pub fn echoed(&self) -> usize {
        self.echoed
    }

    /// Reads what the peer sent and writes it straight back.
    pub fn service(&mut self) -> Result<SessionState> {
        let mut buf = [0u8; DEFAULT_BUFFER_SIZE];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Ok(SessionState::Closed),
                Ok(n) => {
                    self.stream.write_all(&buf[..n]).map_err(|e| {
                        ServerError::NetworkError(format!("Failed to echo to {}: {}", self.peer, e))
                    })?;
                    self.echoed += n;
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(SessionState::Open),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ServerError::IoError(e)),
            }
        }
    }
}
