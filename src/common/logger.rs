use crate::common::error::{Result, ServerError};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(ServerError::ConfigError(format!(
                "Unknown log level '{}'",
                other
            ))),
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

pub struct Logger;

impl Logger {
    pub fn set_level(level: LogLevel) {
        LEVEL.store(level as u8, Ordering::Relaxed);
    }

    pub fn level() -> LogLevel {
        LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
    }

    fn enabled(level: LogLevel) -> bool {
        level <= Self::level()
    }

    pub fn info(msg: &str) {
        if Self::enabled(LogLevel::Info) {
            println!("[INFO] {}", msg);
        }
    }

    pub fn error(msg: &str) {
        eprintln!("[ERROR] {}", msg);
    }

    pub fn warn(msg: &str) {
        if Self::enabled(LogLevel::Warn) {
            eprintln!("[WARN] {}", msg);
        }
    }

    pub fn debug(msg: &str) {
        if Self::enabled(LogLevel::Debug) {
            println!("[DEBUG] {}", msg);
        }
    }

    /// Debug record tagged with the descriptor it concerns.
    pub fn debug_fd(fd: RawFd, msg: &str) {
        if Self::enabled(LogLevel::Debug) {
            println!("[DEBUG] fd={} {}", fd, msg);
        }
    }
}
