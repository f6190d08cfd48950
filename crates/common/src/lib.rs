//! Common utilities for usb2lpt-monitor
//!
//! Shared between the `cpu-monitor` and `lpt-probe` binaries: logging
//! setup, the common error type, and parsing of numeric command-line
//! arguments.

pub mod error;
pub mod logging;
pub mod numbers;

pub use error::{Error, Result};
pub use logging::setup_logging;
pub use numbers::{parse_u8, parse_u16};
