//! Client-side load balancing across query service endpoints.
//!
//! The ha module is organized into:
//! - `strategy` - Round-robin, shuffled round-robin and random selection
//! - `registry` - Rotation state shared between connections
//!

pub mod registry;
pub mod strategy;

pub use registry::{parse_endpoint_list, EndpointRegistry, URL_SEPARATOR};
pub use strategy::LbStrategy;
