// The waiter's thread: poll(2) over the watch set, report ready and expired
// handles, take in new ones from the submission channel.
use crate::common::error::{Result, ServerError};
use crate::common::logger::Logger;
use crate::common::time::IdleTimeout;
use crate::core::event::channel::{ChannelReader, Message, SubmitGate};
use crate::core::event::event::{Dispatch, WaiterEvent};
use crate::core::event::poller::Poller;
use crate::core::event::watch_set::WatchSet;
use std::sync::Arc;
use std::time::Instant;

pub struct EventLoop<T> {
    watch_set: WatchSet<T>,
    reader: ChannelReader<T>,
    gate: Arc<SubmitGate>,
    poller: Poller,
    timeout: IdleTimeout,
    dispatch: Dispatch<T>,
}

impl<T> EventLoop<T> {
    pub fn new(
        watch_set: WatchSet<T>,
        reader: ChannelReader<T>,
        gate: Arc<SubmitGate>,
        poller: Poller,
        timeout: IdleTimeout,
        dispatch: Dispatch<T>,
    ) -> Self {
        Self {
            watch_set,
            reader,
            gate,
            poller,
            timeout,
            dispatch,
        }
    }

    pub fn watch_set(&self) -> &WatchSet<T> {
        &self.watch_set
    }

    /// Runs until a stop request arrives or something fatal happens. Either
    /// way every handle still held goes back through the callback as a
    /// timeout before this returns.
    pub fn run(mut self) -> Result<()> {
        let result = self.serve();
        if let Err(ref e) = result {
            Logger::error(&format!("Poll waiter failed: {}", e));
        }
        // after this nothing new can reach the pipe
        self.gate.close();
        self.flush(Instant::now());
        result
    }

    fn serve(&mut self) -> Result<()> {
        loop {
            self.watch_set.trim();

            let ready = self.poller.wait(self.watch_set.active_mut())?;
            let now = Instant::now();
            self.scan(ready, now)?;

            if self.watch_set.channel_ready() && self.drain()? {
                Logger::debug("Poll waiter stop requested");
                return Ok(());
            }
        }
    }

    /// Walks the active slots after a wake. `ready` is what poll(2) returned,
    /// channel slot included; a zero count is a sweep wake and visits every
    /// slot for expiry.
    pub(crate) fn scan(&mut self, ready: usize, now: Instant) -> Result<()> {
        let cutoff = self.timeout.expiry_cutoff(now);
        let sweep = ready == 0;
        let mut unconsumed = ready;
        let mut i = 1;

        while (sweep || unconsumed > 0) && i < self.watch_set.high_water() {
            let revents = self.watch_set.revents(i);
            let (fd, idle) = {
                let w = self.watch_set.get(i)?;
                (w.fd(), w.idle())
            };

            let event = if revents != 0 {
                unconsumed = unconsumed.saturating_sub(1);
                Logger::debug_fd(fd, &format!("POLL handle revents {:#x}", revents));
                WaiterEvent::Ready
            } else if cutoff.is_some_and(|c| idle <= c) {
                WaiterEvent::Timeout
            } else {
                i += 1;
                continue;
            };

            // the last slot moves into `i`, so `i` is looked at again
            let w = self.watch_set.remove(i).ok_or_else(|| {
                ServerError::InvariantError(format!("slot {} vanished during scan", i))
            })?;
            (self.dispatch)(w, event, now);
        }
        Ok(())
    }

    /// Inserts everything waiting in the channel. Returns true once a stop
    /// request was seen; handles read in the same batch are still inserted.
    /// A corrupt reference fails the drain, but only after the rest of the
    /// batch is in the watch set, where `flush` can return it.
    fn drain(&mut self) -> Result<bool> {
        let mut stop = false;
        let mut failure = None;
        for message in self.reader.drain()? {
            match message {
                Message::Handle(w) => {
                    if let Err(e) = self.watch_set.insert(w) {
                        failure.get_or_insert(e);
                    }
                }
                Message::Stop => stop = true,
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(stop),
        }
    }

    fn flush(&mut self, now: Instant) {
        // pick up anything submitted after the last wake
        while let Ok(messages) = self.reader.drain() {
            if messages.is_empty() {
                break;
            }
            for message in messages {
                if let Message::Handle(w) = message {
                    if let Err(e) = self.watch_set.insert(w) {
                        Logger::error(&format!("Dropping handle during shutdown: {}", e));
                    }
                }
            }
        }

        let remaining = self.watch_set.take_all();
        if !remaining.is_empty() {
            Logger::debug(&format!(
                "Poll waiter returning {} watched handles",
                remaining.len()
            ));
        }
        for w in remaining {
            (self.dispatch)(w, WaiterEvent::Timeout, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::channel::{channel, ChannelWriter};
    use crate::core::event::event::Waited;
    use crate::core::net::fd::FileDescriptor;
    use std::os::unix::io::RawFd;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<(RawFd, WaiterEvent)>>>;

    fn event_loop(timeout_ms: u64) -> (EventLoop<()>, ChannelWriter<()>, Log) {
        let (tx, rx) = channel::<()>(128).unwrap();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let watch_set = WatchSet::new(rx.as_raw_fd(), 4);
        let ev = EventLoop::new(
            watch_set,
            rx,
            Arc::new(SubmitGate::new()),
            Poller::new(None),
            IdleTimeout::from_millis(timeout_ms),
            Box::new(move |w: Box<Waited<()>>, event: WaiterEvent, _now: Instant| {
                sink.lock().unwrap().push((w.fd(), event))
            }),
        );
        (ev, tx, log)
    }

    fn watch(ev: &mut EventLoop<()>, fd: RawFd, idle: Instant) {
        ev.watch_set
            .insert(Box::new(Waited::with_idle(fd, idle, ())))
            .unwrap();
    }

    fn mark_ready(ev: &mut EventLoop<()>, fd: RawFd) {
        for slot in ev.watch_set.active_mut().iter_mut() {
            if slot.fd == fd {
                slot.revents = libc::POLLIN;
            }
        }
    }

    fn watched(ev: &EventLoop<()>) -> Vec<RawFd> {
        (1..ev.watch_set.high_water())
            .map(|i| ev.watch_set.get(i).unwrap().fd())
            .collect()
    }

    #[test]
    fn test_ready_slot_is_reported_once() {
        let (mut ev, _tx, log) = event_loop(60_000);
        let now = Instant::now();
        watch(&mut ev, 5, now);
        mark_ready(&mut ev, 5);

        ev.scan(1, now).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![(5, WaiterEvent::Ready)]);
        assert!(ev.watch_set().is_empty());
    }

    #[test]
    fn test_ready_wins_over_expiry() {
        let (mut ev, _tx, log) = event_loop(0);
        let now = Instant::now();
        watch(&mut ev, 5, now);
        mark_ready(&mut ev, 5);

        ev.scan(1, now).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![(5, WaiterEvent::Ready)]);
    }

    #[test]
    fn test_channel_wake_expires_idle_handles() {
        let (mut ev, _tx, log) = event_loop(0);
        let now = Instant::now();
        for fd in [5, 7, 9] {
            watch(&mut ev, fd, now);
        }
        ev.watch_set.active_mut()[0].revents = libc::POLLIN;

        ev.scan(1, now + Duration::from_millis(1)).unwrap();
        let mut seen = log.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                (5, WaiterEvent::Timeout),
                (7, WaiterEvent::Timeout),
                (9, WaiterEvent::Timeout)
            ]
        );
        assert!(ev.watch_set().is_empty());
    }

    #[test]
    fn test_fresh_handles_stay_watched() {
        let (mut ev, _tx, log) = event_loop(60_000);
        let now = Instant::now();
        for fd in [5, 7, 9] {
            watch(&mut ev, fd, now);
        }
        ev.scan(0, now).unwrap();
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(watched(&ev), vec![5, 7, 9]);
    }

    #[test]
    fn test_relocated_slot_is_rechecked() {
        let (mut ev, _tx, log) = event_loop(60_000);
        let now = Instant::now();
        for fd in [5, 7, 9] {
            watch(&mut ev, fd, now);
        }
        // removing 5 pulls 9 into slot 1; 9 must not be skipped
        mark_ready(&mut ev, 5);
        mark_ready(&mut ev, 9);

        ev.scan(2, now).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![(5, WaiterEvent::Ready), (9, WaiterEvent::Ready)]
        );
        assert_eq!(watched(&ev), vec![7]);
    }

    #[test]
    fn test_scan_stops_after_last_ready_result() {
        let (mut ev, _tx, log) = event_loop(0);
        let start = Instant::now();
        watch(&mut ev, 5, start);
        watch(&mut ev, 7, start);
        watch(&mut ev, 9, start);
        mark_ready(&mut ev, 5);

        // 7 and 9 have expired as well but wait for a later wake: the only
        // ready result was consumed by 5
        ev.scan(1, start + Duration::from_millis(1)).unwrap();
        assert_eq!(log.lock().unwrap()[0], (5, WaiterEvent::Ready));
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(watched(&ev), vec![9, 7]);
    }

    #[test]
    fn test_sweep_wake_visits_every_slot() {
        let (mut ev, _tx, log) = event_loop(10);
        let start = Instant::now();
        watch(&mut ev, 5, start);
        watch(&mut ev, 7, start + Duration::from_secs(60));
        watch(&mut ev, 9, start);

        ev.scan(0, start + Duration::from_millis(20)).unwrap();
        let mut seen = log.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![(5, WaiterEvent::Timeout), (9, WaiterEvent::Timeout)]
        );
        assert_eq!(watched(&ev), vec![7]);
    }

    #[test]
    fn test_drain_inserts_and_sees_stop() {
        let (mut ev, tx, _log) = event_loop(60_000);
        tx.send(Box::new(Waited::new(5, ()))).unwrap();
        assert!(!ev.drain().unwrap());
        tx.send(Box::new(Waited::new(7, ()))).unwrap();
        tx.send_stop().unwrap();
        assert!(ev.drain().unwrap());
        assert_eq!(watched(&ev), vec![5, 7]);
    }

    #[test]
    fn test_drain_rejects_stdin() {
        let (mut ev, tx, _log) = event_loop(60_000);
        tx.send(Box::new(Waited::new(0, ()))).unwrap();
        assert!(matches!(ev.drain(), Err(ServerError::InvariantError(_))));
    }

    #[test]
    fn test_bad_reference_keeps_rest_of_batch() {
        let (mut ev, tx, log) = event_loop(60_000);
        tx.send(Box::new(Waited::new(0, ()))).unwrap();
        tx.send(Box::new(Waited::new(5, ()))).unwrap();
        tx.send(Box::new(Waited::new(7, ()))).unwrap();

        assert!(matches!(ev.drain(), Err(ServerError::InvariantError(_))));
        assert_eq!(watched(&ev), vec![5, 7]);

        ev.flush(Instant::now());
        let mut seen = log.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![(5, WaiterEvent::Timeout), (7, WaiterEvent::Timeout)]
        );
    }

    #[test]
    fn test_run_closes_gate_before_returning_handles() {
        let (mut ev, tx, _log) = event_loop(60_000);
        let gate = Arc::clone(&ev.gate);
        let (quiet, _keep_open) = FileDescriptor::pipe().unwrap();
        watch(&mut ev, quiet.as_raw_fd(), Instant::now());
        tx.send_stop().unwrap();

        ev.run().unwrap();
        assert!(!gate.is_open());
        assert!(gate.enter().is_none());
    }

    #[test]
    fn test_run_returns_watched_handles_on_stop() {
        let (mut ev, tx, log) = event_loop(60_000);
        let (quiet, _keep_open) = FileDescriptor::pipe().unwrap();
        watch(&mut ev, quiet.as_raw_fd(), Instant::now());
        tx.send_stop().unwrap();

        ev.run().unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![(quiet.as_raw_fd(), WaiterEvent::Timeout)]
        );
    }
}
