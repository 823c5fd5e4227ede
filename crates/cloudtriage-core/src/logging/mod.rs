//! Logging abstractions shared by every orchestration component
//!
//! Components receive an `Arc<dyn Logger>` and prefix their lines with the
//! component name (`[HandlerFactory] ...`). The global `file_logger` is used
//! by code that has no logger handle (secret stores, credential helpers).

mod traits;
mod noop;
mod console;
mod memory;
pub mod file_logger;

pub use traits::{Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use memory::{MemoryLogger, LogRecord};

pub use file_logger::{
    log, trace, debug, info, warn, error,
    log_file_path, clear_log, LogLevel,
};
