//! The waiter contract: watch connections for readability or idleness on a
//! background thread and hand each one back exactly once.
pub mod poll;

use crate::application::config::models::WaiterConfig;
use crate::common::error::{Result, SubmitError};
use crate::common::time::IdleTimeout;
use crate::core::event::event::{Dispatch, Waited};

pub use poll::PollWaiter;

pub trait Waiter<T: Send + 'static>: Sized {
    /// Backend name, e.g. `"poll"`.
    fn name(&self) -> &'static str;

    /// Sets up the backend and starts its thread. `dispatch` receives every
    /// handle back, on that thread.
    fn start(config: &WaiterConfig, timeout: IdleTimeout, dispatch: Dispatch<T>) -> Result<Self>;

    /// Passes ownership of `handle` to the waiter. On error the handle is
    /// returned inside the error and the waiter never saw it.
    fn submit(&self, handle: Box<Waited<T>>) -> std::result::Result<(), SubmitError<T>>;

    /// Stops the thread and waits for it. Handles still watched are handed
    /// to `dispatch` as timeouts first.
    fn stop(self) -> Result<()>;
}
