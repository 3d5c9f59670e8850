//! Connection configuration and the connection facade.
//!
//! This module provides connect string parsing, endpoint resolution, and the
//! `Connection` type through which statements are prepared and executed.
//!

pub mod config;
#[allow(clippy::module_inception)]
pub mod connection;

pub use config::{ConnectionConfig, DEFAULT_FETCH_SIZE, ENV_PREFIX};
pub use connection::Connection;
