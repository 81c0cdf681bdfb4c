//! Utility functions for logging setup

mod logging;

pub use logging::{setup_logging, LogConfig};
