use crate::application::config::models::WaiterConfig;
use crate::common::constants::WAITER_NAME;
use crate::common::error::{Result, ServerError, SubmitError};
use crate::common::logger::Logger;
use crate::common::time::IdleTimeout;
use crate::core::event::channel::{channel, ChannelWriter, SubmitGate};
use crate::core::event::event::{Dispatch, Waited};
use crate::core::event::event_loop::EventLoop;
use crate::core::event::poller::Poller;
use crate::core::event::watch_set::WatchSet;
use crate::core::waiter::Waiter;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Waiter backed by poll(2) and a pipe.
///
/// `submit` takes `&self` and may be called from any number of threads;
/// `stop` consumes the waiter, so no submission can race with it.
pub struct PollWaiter<T: Send + 'static> {
    writer: ChannelWriter<T>,
    thread: Option<JoinHandle<Result<()>>>,
    gate: Arc<SubmitGate>,
}

impl<T: Send + 'static> PollWaiter<T> {
    pub fn is_running(&self) -> bool {
        self.gate.is_open()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        if self.is_running() {
            // a loop that died on its own has already closed the read end
            if let Err(e) = self.writer.send_stop() {
                Logger::warn(&format!("Could not signal poll waiter: {}", e));
            }
        }

        match thread.join() {
            Ok(result) => result,
            Err(_) => Err(ServerError::InvariantError(
                "poll waiter thread panicked".to_string(),
            )),
        }
    }
}

impl<T: Send + 'static> Waiter<T> for PollWaiter<T> {
    fn name(&self) -> &'static str {
        WAITER_NAME
    }

    fn start(config: &WaiterConfig, timeout: IdleTimeout, dispatch: Dispatch<T>) -> Result<Self> {
        let (writer, reader) = channel::<T>(config.drain_batch)?;
        let watch_set = WatchSet::new(reader.as_raw_fd(), config.poll_space_increment);
        let poller = Poller::new(config.sweep_interval());
        let gate = Arc::new(SubmitGate::new());
        let event_loop = EventLoop::new(
            watch_set,
            reader,
            Arc::clone(&gate),
            poller,
            timeout,
            dispatch,
        );

        let thread = thread::Builder::new()
            .name(format!("waiter-{}", WAITER_NAME))
            .spawn(move || event_loop.run())?;

        Logger::debug(&format!(
            "Started {} waiter (increment {}, batch {})",
            WAITER_NAME, config.poll_space_increment, config.drain_batch
        ));

        Ok(Self {
            writer,
            thread: Some(thread),
            gate,
        })
    }

    fn submit(&self, handle: Box<Waited<T>>) -> std::result::Result<(), SubmitError<T>> {
        // stdin is never a connection
        if handle.fd() <= 0 {
            return Err(SubmitError::InvalidDescriptor(handle));
        }
        let Some(_pass) = self.gate.enter() else {
            return Err(SubmitError::Stopped(handle));
        };
        self.writer.send(handle)
    }

    fn stop(mut self) -> Result<()> {
        self.shutdown()
    }
}

impl<T: Send + 'static> Drop for PollWaiter<T> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            Logger::error(&format!("Poll waiter stopped with error: {}", e));
        }
    }
}
