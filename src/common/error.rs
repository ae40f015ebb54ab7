use crate::core::event::event::Waited;
use std::fmt;

#[derive(Debug)]
pub enum ServerError {
    IoError(std::io::Error),
    ConfigError(String),
    ParseError(String),
    NetworkError(String),
    ChannelError(String),
    PollError(std::io::Error),
    InvariantError(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::IoError(e) => write!(f, "IO error: {}", e),
            ServerError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ServerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ServerError::ChannelError(msg) => write!(f, "Channel error: {}", msg),
            ServerError::PollError(e) => write!(f, "poll(2) failed: {}", e),
            ServerError::InvariantError(msg) => write!(f, "Invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::IoError(err)
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// A rejected submission. The handle is handed back untouched, the caller
/// still owns it.
pub enum SubmitError<T> {
    InvalidDescriptor(Box<Waited<T>>),
    ChannelWrite(Box<Waited<T>>, std::io::Error),
    Stopped(Box<Waited<T>>),
}

impl<T> SubmitError<T> {
    pub fn into_handle(self) -> Box<Waited<T>> {
        match self {
            SubmitError::InvalidDescriptor(w)
            | SubmitError::ChannelWrite(w, _)
            | SubmitError::Stopped(w) => w,
        }
    }
}

impl<T> fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<T> fmt::Display for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::InvalidDescriptor(w) => {
                write!(f, "Invalid descriptor {} for waiter", w.fd())
            }
            SubmitError::ChannelWrite(w, e) => {
                write!(f, "Failed to hand fd {} to waiter: {}", w.fd(), e)
            }
            SubmitError::Stopped(w) => write!(f, "Waiter stopped, fd {} not accepted", w.fd()),
        }
    }
}

impl<T> std::error::Error for SubmitError<T> {}
