use crate::application::config::models::Config;
use crate::application::server::listener::Listener;
use crate::application::server::session::{Session, SessionState};
use crate::common::error::Result;
use crate::common::logger::Logger;
use crate::common::time::IdleTimeout;
use crate::core::event::event::{Waited, WaiterEvent};
use crate::core::waiter::{PollWaiter, Waiter};
use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;

type Reported = (Box<Waited<Session>>, WaiterEvent);

/// Accepts connections and keeps them parked in a poll waiter between
/// requests. The waiter callback only forwards handles to a worker thread,
/// which does the I/O and resubmits live sessions.
pub struct ServerManager {
    config: Config,
    listener: Listener,
    timeout: IdleTimeout,
}

impl ServerManager {
    /// Bind the listener described by the configuration
    pub fn new(config: Config) -> Result<Self> {
        let addr = SocketAddr::new(config.server.address, config.server.port);
        let listener = Listener::new(addr)?;
        let timeout = IdleTimeout::new(config.waiter.idle_timeout());
        Ok(Self {
            config,
            listener,
            timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.addr()
    }

    /// Shared idle timeout; changing it affects sessions already parked
    pub fn idle_timeout(&self) -> IdleTimeout {
        self.timeout.clone()
    }

    pub fn print_server_info(&self) {
        Logger::info(&format!("Listening on {}", self.listener.addr()));
        Logger::info(&format!(
            "Idle timeout {} ms, sweep {}",
            self.config.waiter.idle_timeout_ms,
            match self.config.waiter.sweep_interval_ms {
                Some(ms) => format!("every {} ms", ms),
                None => "on wake only".to_string(),
            }
        ));
    }

    /// Serve until accepting fails
    pub fn run(&mut self) -> Result<()> {
        let (tx, rx) = mpsc::channel::<Reported>();
        let waiter: Arc<PollWaiter<Session>> = Arc::new(PollWaiter::start(
            &self.config.waiter,
            self.timeout.clone(),
            Box::new(move |w: Box<Waited<Session>>, event: WaiterEvent, _now: Instant| {
                // the worker is gone only during shutdown
                let _ = tx.send((w, event));
            }),
        )?);
        Logger::info(&format!("Using {} waiter", waiter.name()));

        let weak = Arc::downgrade(&waiter);
        let worker = thread::Builder::new()
            .name("session-worker".to_string())
            .spawn(move || work(weak, rx))?;

        let result = self.accept_loop(&waiter);

        drop(waiter);
        if worker.join().is_err() {
            Logger::error("Session worker panicked");
        }
        result
    }

    fn accept_loop(&self, waiter: &PollWaiter<Session>) -> Result<()> {
        loop {
            let session = self.listener.accept()?;
            let fd = session.as_raw_fd();
            Logger::debug_fd(fd, &format!("accepted {}", session.peer_addr()));

            if let Err(e) = waiter.submit(Box::new(Waited::new(fd, session))) {
                Logger::warn(&format!("Dropping new connection: {}", e));
            }
        }
    }
}

fn work(waiter: Weak<PollWaiter<Session>>, rx: Receiver<Reported>) {
    for (mut w, event) in rx {
        let fd = w.fd();
        match event {
            WaiterEvent::Timeout => {
                Logger::debug_fd(fd, "idle timeout, closing");
                continue;
            }
            WaiterEvent::Ready => {}
        }

        match w.token_mut().service() {
            Ok(SessionState::Open) => {}
            Ok(SessionState::Closed) => {
                Logger::debug_fd(fd, "peer closed");
                continue;
            }
            Err(e) => {
                Logger::warn(&format!("Closing session: {}", e));
                continue;
            }
        }

        w.touch();
        let Some(live) = waiter.upgrade() else {
            continue;
        };
        if let Err(e) = live.submit(w) {
            Logger::warn(&format!("Could not park session: {}", e));
        }
    }
}
