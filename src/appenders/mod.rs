//! Appender implementations

#[cfg(feature = "console")]
pub mod console;
pub mod file;
pub mod memory;

#[cfg(feature = "console")]
pub use console::ConsoleAppender;
pub use file::FileAppender;
pub use memory::MemoryAppender;

pub use crate::core::Appender;
