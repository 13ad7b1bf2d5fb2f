//! Shared helpers for the sample binaries.

pub mod math;

use tessera_engine::logging::{LoggingConfig, init_logging};

/// Logger setup shared by every sample.
pub fn init() {
    init_logging(LoggingConfig::default());
}
