//! Row pipeline
//!
//! Streams a source file's records, normalizes cell values and validates
//! them against the destination table's live columns.

pub mod literal;
pub mod mapper;
pub mod normalize;
pub mod reader;

pub use literal::{LiteralError, parse_literal};
pub use mapper::{RowError, RowMapper};
pub use normalize::ValueNormalizer;
pub use reader::{RawRecord, ReadError, RecordReader};
