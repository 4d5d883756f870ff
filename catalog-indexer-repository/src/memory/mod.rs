//! In-memory implementations of the repository interfaces.

mod source;

pub use source::{CategoryRecord, InMemorySource, PersonRecord, WorkRecord};
