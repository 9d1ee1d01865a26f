//! Sink implementations
//!
//! Contains LogSink, FileSink, AgeParitySink, and FnSink.

mod age_parity;
mod file;
mod func;
mod log;

pub use self::age_parity::{age_in_years, AgeParityConfig, AgeParitySink};
pub use self::file::{FileSink, FileSinkConfig};
pub use self::func::FnSink;
pub use self::log::LogSink;
