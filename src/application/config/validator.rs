use crate::application::config::models::{Config, ServerConfig, WaiterConfig};
use crate::common::constants::MAX_DRAIN_BATCH;
use crate::common::error::{Result, ServerError};
use crate::common::logger::LogLevel;

/// Validate configuration for correctness and consistency
pub fn validate_config(config: &Config) -> Result<()> {
    LogLevel::parse(&config.log_level)?;
    validate_waiter(&config.waiter)?;
    validate_server(&config.server)?;
    Ok(())
}

pub fn validate_waiter(waiter: &WaiterConfig) -> Result<()> {
    if waiter.idle_timeout_ms == 0 {
        return Err(ServerError::ConfigError(
            "waiter.idle_timeout_ms must be greater than 0".to_string(),
        ));
    }

    if waiter.poll_space_increment == 0 {
        return Err(ServerError::ConfigError(
            "waiter.poll_space_increment must be greater than 0".to_string(),
        ));
    }

    if waiter.drain_batch == 0 || waiter.drain_batch > MAX_DRAIN_BATCH {
        return Err(ServerError::ConfigError(format!(
            "waiter.drain_batch must be between 1 and {}",
            MAX_DRAIN_BATCH
        )));
    }

    if waiter.sweep_interval_ms == Some(0) {
        return Err(ServerError::ConfigError(
            "waiter.sweep_interval_ms must be greater than 0 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<()> {
    if server.port == 0 {
        return Err(ServerError::ConfigError(
            "server.port cannot be 0".to_string(),
        ));
    }
    Ok(())
}
