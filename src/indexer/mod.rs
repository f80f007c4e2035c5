pub mod chain;
pub mod decoder;
pub mod receipt_fetcher;
pub mod source;
pub mod types;
