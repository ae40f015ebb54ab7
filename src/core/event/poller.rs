use crate::common::error::{Result, ServerError};
use libc::{c_int, nfds_t, pollfd};
use std::io;
use std::time::Duration;

/// Thin wrapper over `poll(2)`.
pub struct Poller {
    timeout_ms: c_int,
}

impl Poller {
    /// `None` blocks until something is readable.
    pub fn new(sweep_interval: Option<Duration>) -> Self {
        let timeout_ms = match sweep_interval {
            Some(d) => d.as_millis().min(c_int::MAX as u128) as c_int,
            None => -1,
        };
        Self { timeout_ms }
    }

    pub fn is_indefinite(&self) -> bool {
        self.timeout_ms < 0
    }

    /// Waits on `fds` and returns how many entries have non-zero `revents`.
    /// Interrupted waits are restarted.
    pub fn wait(&self, fds: &mut [pollfd]) -> Result<usize> {
        loop {
            let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as nfds_t, self.timeout_ms) };
            if n >= 0 {
                return Ok(n as usize);
            }

            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(ServerError::PollError(err));
            }
        }
    }
}
