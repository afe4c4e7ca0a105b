//! Logging setup.
//!
//! The crate itself only emits through the `log` facade. Hosts that have no
//! logger of their own can install `env_logger` here.

mod init;

pub use init::{init_logging, LoggingConfig};
