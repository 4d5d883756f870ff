//! Processor module for the catalog indexer pipeline.
//!
//! Transforms aggregated rows into search documents.

mod array_literal;
mod document_transformer;

pub use array_literal::parse_array_literal;
pub use document_transformer::{DocumentTransformer, TransformError};
