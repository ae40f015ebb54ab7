use std::os::unix::io::RawFd;
use std::time::Instant;

/// What the waiter observed for a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WaiterEvent {
    /// The descriptor became readable (or hung up / errored).
    Ready,
    /// The handle sat idle for at least the configured timeout.
    Timeout,
}

/// A connection handed to a waiter.
///
/// The waiter only reads `fd` and `idle`. `token` is whatever the owner needs
/// to resume the connection once the handle comes back through the dispatch
/// callback.
#[derive(Debug)]
pub struct Waited<T> {
    fd: RawFd,
    idle: Instant,
    token: T,
}

impl<T> Waited<T> {
    pub fn new(fd: RawFd, token: T) -> Self {
        Self::with_idle(fd, Instant::now(), token)
    }

    pub fn with_idle(fd: RawFd, idle: Instant, token: T) -> Self {
        Self { fd, idle, token }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn idle(&self) -> Instant {
        self.idle
    }

    /// Marks activity now.
    pub fn touch(&mut self) {
        self.idle = Instant::now();
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }
}

/// Callback run on the event loop thread for every reported handle. It owns
/// the handle from then on and must not block.
pub type Dispatch<T> = Box<dyn FnMut(Box<Waited<T>>, WaiterEvent, Instant) + Send>;
