pub mod analyzer;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod lang;
pub mod paths;
pub mod spimi;

pub use config::{IndexConfig, SearchConfig};
pub use engine::SearchEngine;
pub use error::{Error, Result};
pub use lang::Language;
pub use spimi::{build, BuildResult};

/// A single posting: `(doc_uid, normalized term frequency)`.
/// Serializes as the JSON array `["<doc_uid>",<tf>]`.
pub type Posting = (String, f64);
