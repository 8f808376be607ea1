//! stock-ticker - Core Library
//! Randomized stock price engine with real-time fan-out to subscribers

// Public modules
pub mod core;
pub mod config;
pub mod store;
pub mod policy;
pub mod ticker;
pub mod broadcast;
pub mod transport;

// Re-exports
pub use core::{Error, Result, Stock, Symbol};
