// Submission channel: boxed handles cross into the event loop thread as raw
// pointer values written to a pipe. Each message is one machine word, so a
// single write(2) of it is atomic and concurrent submitters never interleave.
use crate::common::constants::POSIX_PIPE_BUF;
use crate::common::error::{Result, ServerError, SubmitError};
use crate::core::event::event::Waited;
use crate::core::net::fd::FileDescriptor;
use std::io;
use std::marker::PhantomData;
use std::mem::size_of;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

const WORD: usize = size_of::<usize>();

const _: () = assert!(WORD <= POSIX_PIPE_BUF);

/// Never a valid `Box` address; asks the loop to stop.
const STOP: usize = 0;

/// Admission control for writers. Once the reader closes the gate and
/// `close` returns, no write can still land in the pipe, so one more drain
/// sees everything that was ever accepted.
#[derive(Debug)]
pub struct SubmitGate {
    open: AtomicBool,
    inflight: AtomicUsize,
}

/// Held for the duration of one write.
pub struct GatePass<'a> {
    gate: &'a SubmitGate,
}

impl SubmitGate {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            inflight: AtomicUsize::new(0),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// `None` once the gate is closed.
    pub fn enter(&self) -> Option<GatePass<'_>> {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        let pass = GatePass { gate: self };
        if self.open.load(Ordering::SeqCst) {
            Some(pass)
        } else {
            None
        }
    }

    /// Refuses new writers and waits out the ones already admitted.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        while self.inflight.load(Ordering::SeqCst) > 0 {
            thread::yield_now();
        }
    }
}

impl Default for SubmitGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.gate.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub enum Message<T> {
    Handle(Box<Waited<T>>),
    Stop,
}

pub struct ChannelWriter<T> {
    fd: FileDescriptor,
    _marker: PhantomData<fn(Box<Waited<T>>)>,
}

pub struct ChannelReader<T> {
    fd: FileDescriptor,
    buf: Vec<u8>,
    _marker: PhantomData<fn() -> Box<Waited<T>>>,
}

/// Opens the pipe. `batch` is the most references one `drain` reads.
pub fn channel<T: Send>(batch: usize) -> Result<(ChannelWriter<T>, ChannelReader<T>)> {
    let (read_end, write_end) = FileDescriptor::pipe()?;
    read_end.set_non_blocking()?;
    Ok((
        ChannelWriter {
            fd: write_end,
            _marker: PhantomData,
        },
        ChannelReader {
            fd: read_end,
            buf: vec![0u8; batch.max(1) * WORD],
            _marker: PhantomData,
        },
    ))
}

impl<T: Send> ChannelWriter<T> {
    /// Hands `w` to the reader. On failure nothing was transferred and the
    /// handle comes back inside the error.
    pub fn send(&self, w: Box<Waited<T>>) -> std::result::Result<(), SubmitError<T>> {
        let ptr = Box::into_raw(w);
        let bytes = (ptr as usize).to_ne_bytes();
        match self.fd.write(&bytes) {
            Ok(WORD) => Ok(()),
            Ok(n) => {
                // SAFETY: a short write delivered no whole message, so the
                // reader can never decode this pointer.
                let w = unsafe { Box::from_raw(ptr) };
                Err(SubmitError::ChannelWrite(
                    w,
                    io::Error::new(io::ErrorKind::WriteZero, format!("short write of {} bytes", n)),
                ))
            }
            Err(e) => {
                // SAFETY: the write failed, the pointer never left this thread.
                let w = unsafe { Box::from_raw(ptr) };
                Err(SubmitError::ChannelWrite(w, e))
            }
        }
    }

    pub fn send_stop(&self) -> Result<()> {
        match self.fd.write(&STOP.to_ne_bytes()) {
            Ok(WORD) => Ok(()),
            Ok(n) => Err(ServerError::ChannelError(format!(
                "short write of {} bytes for stop request",
                n
            ))),
            Err(e) => Err(ServerError::ChannelError(format!(
                "Failed to send stop request: {}",
                e
            ))),
        }
    }
}

impl<T> ChannelReader<T> {
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Reads up to one batch of whole messages. An empty result means the
    /// pipe had nothing to read.
    pub fn drain(&mut self) -> Result<Vec<Message<T>>> {
        let n = match self.fd.read(&mut self.buf) {
            Ok(0) => {
                return Err(ServerError::ChannelError(
                    "submission channel closed by writer".to_string(),
                ))
            }
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Vec::new()),
            Err(e) => return Err(ServerError::IoError(e)),
        };
        if n % WORD != 0 {
            return Err(ServerError::InvariantError(format!(
                "read {} bytes from submission channel, not a whole number of references",
                n
            )));
        }

        let mut messages = Vec::with_capacity(n / WORD);
        for chunk in self.buf[..n].chunks_exact(WORD) {
            let mut word = [0u8; WORD];
            word.copy_from_slice(chunk);
            let raw = usize::from_ne_bytes(word);
            if raw == STOP {
                messages.push(Message::Stop);
            } else {
                // SAFETY: every non-zero word on this pipe was produced by
                // `Box::into_raw` in `ChannelWriter::<T>::send` and is read
                // exactly once, here.
                let w = unsafe { Box::from_raw(raw as *mut Waited<T>) };
                messages.push(Message::Handle(w));
            }
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fds(messages: Vec<Message<u32>>) -> Vec<Option<RawFd>> {
        messages
            .into_iter()
            .map(|m| match m {
                Message::Handle(w) => Some(w.fd()),
                Message::Stop => None,
            })
            .collect()
    }

    #[test]
    fn test_handles_arrive_in_order() {
        let (tx, mut rx) = channel::<u32>(128).unwrap();
        for fd in [5, 7, 9] {
            tx.send(Box::new(Waited::new(fd, fd as u32))).unwrap();
        }
        assert_eq!(fds(rx.drain().unwrap()), vec![Some(5), Some(7), Some(9)]);
    }

    #[test]
    fn test_token_survives_transfer() {
        let (tx, mut rx) = channel::<String>(4).unwrap();
        tx.send(Box::new(Waited::new(5, "session".to_string()))).unwrap();
        match rx.drain().unwrap().pop() {
            Some(Message::Handle(w)) => assert_eq!(w.token(), "session"),
            _ => panic!("expected a handle"),
        }
    }

    #[test]
    fn test_drain_respects_batch_size() {
        let (tx, mut rx) = channel::<u32>(2).unwrap();
        for fd in [5, 7, 9] {
            tx.send(Box::new(Waited::new(fd, 0))).unwrap();
        }
        assert_eq!(fds(rx.drain().unwrap()), vec![Some(5), Some(7)]);
        assert_eq!(fds(rx.drain().unwrap()), vec![Some(9)]);
        assert!(rx.drain().unwrap().is_empty());
    }

    #[test]
    fn test_stop_is_distinct_from_handles() {
        let (tx, mut rx) = channel::<u32>(8).unwrap();
        tx.send(Box::new(Waited::new(5, 0))).unwrap();
        tx.send_stop().unwrap();
        assert_eq!(fds(rx.drain().unwrap()), vec![Some(5), None]);
    }

    #[test]
    fn test_send_after_reader_closed_returns_handle() {
        let (tx, rx) = channel::<u32>(8).unwrap();
        drop(rx);
        let err = tx.send(Box::new(Waited::new(5, 42))).unwrap_err();
        assert!(matches!(err, SubmitError::ChannelWrite(_, _)));
        assert_eq!(*err.into_handle().token(), 42);
    }

    #[test]
    fn test_gate_refuses_after_close() {
        let gate = SubmitGate::new();
        assert!(gate.enter().is_some());
        gate.close();
        assert!(!gate.is_open());
        assert!(gate.enter().is_none());
    }

    #[test]
    fn test_gate_close_waits_for_admitted_writer() {
        let gate = std::sync::Arc::new(SubmitGate::new());
        let (admitted_tx, admitted_rx) = std::sync::mpsc::channel();
        let writer = {
            let gate = std::sync::Arc::clone(&gate);
            thread::spawn(move || {
                let _pass = gate.enter().unwrap();
                admitted_tx.send(()).unwrap();
                thread::sleep(std::time::Duration::from_millis(100));
            })
        };
        admitted_rx.recv().unwrap();

        let started = std::time::Instant::now();
        gate.close();
        assert!(started.elapsed() >= std::time::Duration::from_millis(50));
        writer.join().unwrap();
    }

    #[test]
    fn test_writer_closed_is_an_error() {
        let (tx, mut rx) = channel::<u32>(8).unwrap();
        drop(tx);
        assert!(rx.drain().is_err());
    }
}
