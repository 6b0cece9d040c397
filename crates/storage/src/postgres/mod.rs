mod client;

pub use client::PostgresPromptCache;
