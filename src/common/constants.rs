pub const WAITER_NAME: &str = "poll";

pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 5000;
pub const POLL_SPACE_INCREMENT: usize = 1 << 16; // slots per growth step
pub const DRAIN_BATCH: usize = 128; // references per channel read
pub const MAX_DRAIN_BATCH: usize = 1024;

/// POSIX guarantees writes up to this size to a pipe are atomic.
pub const POSIX_PIPE_BUF: usize = 512;

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB
