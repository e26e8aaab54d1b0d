//! Tracing bootstrap for Shopdesk binaries
//!
//! Libraries only emit `tracing` events; binaries call [`init::init_tracing`]
//! once at startup to install a subscriber.

pub mod config;
pub mod init;

pub use config::InstrumentationConfig;
pub use init::init_tracing;
