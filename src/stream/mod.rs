//! Streaming decode of query responses into result pages.
//!
//! The stream module is organized into:
//! - `token` - Incremental JSON tokenizer over any byte reader
//! - `decoder` - Rows and pages from a response token stream
//! - `channel` - Bounded producer/consumer handoff of pages
//! - `producer` - Background tasks driving a decoder into a channel
//!

pub mod channel;
pub mod decoder;
pub mod producer;
pub mod token;

pub use channel::{FrameSender, ResultChannel, ResultStream, DEFAULT_PREFETCH_PAGES};
pub use decoder::{decode_value, ResponseDecoder};
pub use producer::{produce, spawn_producer};
pub use token::{JsonToken, JsonTokenReader};
