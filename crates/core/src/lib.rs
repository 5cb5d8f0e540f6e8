//! Core types, parsing, and the sliding-window cache for the impression engine.

pub mod access_log;
pub mod duration;
pub mod error;
pub mod events;
pub mod window;

pub use access_log::{AccessLogFormat, AccessLogParser, EventFilter, LogLine, RequestLine};
pub use duration::IsoDuration;
pub use error::{Error, ExitStatus, Result};
pub use events::*;
pub use window::WindowCache;
