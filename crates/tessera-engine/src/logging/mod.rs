//! Logger setup on `env_logger` behind the `log` facade.

mod init;

pub use init::{init_logging, LoggingConfig};
