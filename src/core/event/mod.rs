pub mod channel;
pub mod event;
pub mod event_loop;
pub mod poller;
pub mod watch_set;
