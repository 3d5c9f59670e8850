//! Row access for query results.
//!
//! The cursor module is organized into:
//! - `accessor` - Column accessors over sequence, scalar, record and map rows
//! - `result` - Forward-only cursor pulling pages from a result stream
//!

pub mod accessor;
pub mod result;

pub use accessor::{Accessor, Getter, NullFlag, PositionedCursor, RowShape};
pub use result::ResultCursor;
