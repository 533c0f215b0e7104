//! Yahoo Finance price source.

pub mod quotes;

pub use quotes::YahooQuoteProvider;
