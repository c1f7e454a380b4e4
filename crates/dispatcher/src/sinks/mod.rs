//! Sink implementations
//!
//! Contains LogSink, ConsoleSink, and FileSink.

mod console;
mod file;
mod log;

pub use self::console::{time_label, ConsoleSink, ConsoleSinkConfig};
pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
