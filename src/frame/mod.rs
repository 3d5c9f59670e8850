//! Result pages and the policies that bound them.
//!
//! The frame module is organized into:
//! - `limiter` - Page size policies (row count, elapsed time, combined)
//! - `page` - Result pages and the envelopes carrying them to consumers
//! - `builder` - Server-side paging of an in-memory row source
//!

pub mod builder;
pub mod limiter;
pub mod page;

pub use builder::FrameBuilder;
pub use limiter::{Clock, FrameLimiter, FrameLimiters, LimitContext, ManualClock, SystemClock};
pub use page::{ResultEnvelope, ResultPage};
