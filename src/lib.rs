pub mod config;
pub mod engine;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod ingest;
pub mod output;
pub mod stats;
