//! Column metadata, representation kinds, and decoded values.

mod rep;
mod schema;
mod value;

pub use rep::{sql_type, Rep};
pub use schema::{ColumnMetaData, ColumnType, CursorFactory, CursorStyle, Signature};
pub use value::{FieldDescriptor, Record, Row, Value};
