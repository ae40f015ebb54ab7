// Common test utilities for the waiter integration tests

use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use pollwait::application::config::models::WaiterConfig;
use pollwait::core::event::event::{Dispatch, Waited, WaiterEvent};

pub type Handle = Box<Waited<UnixStream>>;
pub type Report = (RawFd, WaiterEvent, Handle);

/// A watched connection plus the peer that can make it readable
pub fn connection() -> (Handle, UnixStream) {
    let (local, peer) = UnixStream::pair().expect("socketpair");
    let fd = local.as_raw_fd();
    (Box::new(Waited::new(fd, local)), peer)
}

/// Dispatch callback that forwards every report to the returned receiver
pub fn recorder() -> (Dispatch<UnixStream>, Receiver<Report>) {
    let (tx, rx) = mpsc::channel();
    let dispatch: Dispatch<UnixStream> = Box::new(move |w: Handle, event: WaiterEvent, _now: Instant| {
        let _ = tx.send((w.fd(), event, w));
    });
    (dispatch, rx)
}

#[allow(dead_code)] // not every test file tunes every knob
pub fn waiter_config(idle_timeout_ms: u64, sweep_interval_ms: Option<u64>) -> WaiterConfig {
    WaiterConfig {
        idle_timeout_ms,
        poll_space_increment: 16,
        drain_batch: 128,
        sweep_interval_ms,
    }
}

/// Collect reports until `count` arrived or `limit` passed
#[allow(dead_code)]
pub fn collect(rx: &Receiver<Report>, count: usize, limit: Duration) -> Vec<Report> {
    let deadline = Instant::now() + limit;
    let mut out = Vec::new();
    while out.len() < count {
        let left = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok(report) => out.push(report),
            Err(_) => break,
        }
    }
    out
}
