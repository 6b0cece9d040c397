//! Core types and traits for the graphsearch global search system
//!
//! This crate provides the foundational pieces shared by the other crates:
//!
//! - **Models**: graph tables, context chunks, key points and LLM outputs
//! - **Configuration**: layered TOML / environment configuration
//! - **Error handling**: unified error types and invocation failures
//! - **Tokenizer**: token counting used for context and reduce budgets
//!

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod error;
pub mod models;
pub mod prompt;
pub mod tokenizer;

// Re-export main types for convenience
pub use config::{Config, GraphConfig, LlmConfig, SearchConfig, StorageConfig};
pub use error::{Error, ErrorCategory, InvocationError, Result, ResultExt, Stage};
pub use models::{
    Alternative, CommunityReport, ContextChunk, EntityRecord, GraphTables, KeyPoint, LlmOutput,
    NodeSet,
};
pub use tokenizer::{create_token_counter, HfTokenCounter, TokenCounter, WordTokenCounter};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::models::{KeyPoint, LlmOutput, NodeSet};
}
