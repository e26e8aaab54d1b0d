//! Shopdesk HTTP client with session lifecycle management
//!
//! Every request issued through [`client::ShopdeskClient`] passes through the
//! request interceptor (expiry check, bearer header) and, on failure, through
//! the refresh coordinator, which shares a single token refresh between all
//! requests that hit a 401 while it is in flight.

pub mod client;
pub mod types;

pub use client::{ClientError, ShopdeskClient, ShopdeskClientBuilder};
