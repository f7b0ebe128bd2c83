//! Common utilities for busattach
//!
//! Tracing setup and its error type, used by the monitor binary.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::setup_logging;
