//! Watermark store implementations.

mod json_file;
#[cfg(any(test, feature = "test-util"))]
mod memory;

pub use json_file::JsonFileWatermarkStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryWatermarkStore;
