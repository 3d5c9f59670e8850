//! Column accessors over heterogeneous row objects.
//!
//! Backends shape rows differently: a value sequence, a bare scalar for
//! single-column results, a record with named fields, or a keyed map. An
//! [`Accessor`] knows how to pull one column out of one of these shapes. A
//! [`Getter`] pairs an accessor with the cursor's shared null flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::AccessError;
use crate::types::{CursorStyle, FieldDescriptor, Row, Signature, Value};

/// A cursor positioned on a row.
pub trait PositionedCursor {
    /// The current row.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::NoCurrentRow` if the cursor is not on a row.
    fn current(&self) -> Result<&Row, AccessError>;
}

/// Whether the last value read through a cursor was null.
#[derive(Debug, Default)]
pub struct NullFlag(AtomicBool);

impl NullFlag {
    #[must_use]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, was_null: bool) {
        self.0.store(was_null, Ordering::Relaxed);
    }
}

/// How to read one column from a row object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    /// Element at the given index of a value sequence.
    Sequence(usize),
    /// The row itself; only valid for column 0.
    Scalar,
    /// Named field of a record.
    Field(FieldDescriptor),
    /// Entry of a keyed map.
    Key(String),
}

impl Accessor {
    /// Scalar accessor for `column`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidAccessor` unless `column` is 0.
    pub fn scalar(column: usize) -> Result<Self, AccessError> {
        if column != 0 {
            return Err(AccessError::InvalidAccessor(format!(
                "scalar rows have a single column, got column {column}"
            )));
        }
        Ok(Accessor::Scalar)
    }

    /// Read this accessor's column from `row`.
    ///
    /// A missing map key reads as null.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Access` if the row does not have the expected
    /// shape, the index is out of range, or the record fails.
    pub fn read(&self, row: &Row) -> Result<Value, AccessError> {
        match (self, row) {
            (Accessor::Sequence(index), Row::Sequence(values)) => {
                values.get(*index).cloned().ok_or_else(|| {
                    AccessError::Access(format!(
                        "index {index} out of range for row of {} values",
                        values.len()
                    ))
                })
            }
            (Accessor::Scalar, Row::Scalar(value)) => Ok(value.clone()),
            (Accessor::Field(field), Row::Record(record)) => {
                record.field(field).map_err(AccessError::Access)
            }
            (Accessor::Key(key), Row::Map(map)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
            (accessor, row) => Err(AccessError::Access(format!(
                "{} accessor cannot read a {} row",
                accessor.kind_name(),
                row_kind(row)
            ))),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Accessor::Sequence(_) => "sequence",
            Accessor::Scalar => "scalar",
            Accessor::Field(_) => "field",
            Accessor::Key(_) => "key",
        }
    }
}

fn row_kind(row: &Row) -> &'static str {
    match row {
        Row::Scalar(_) => "scalar",
        Row::Sequence(_) => "sequence",
        Row::Record(_) => "record",
        Row::Map(_) => "map",
    }
}

/// Shape of the row objects a statement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    Sequence,
    Scalar,
    Record,
    Map,
}

impl RowShape {
    /// Shape used for a signature.
    ///
    /// An explicit cursor style wins. Otherwise single-column results are
    /// scalar and everything else is a sequence.
    #[must_use]
    pub fn deduce(signature: &Signature) -> Self {
        match &signature.cursor_factory {
            Some(factory) => Self::from_style(factory.style),
            None => Self::decoded(signature.column_count()),
        }
    }

    /// Shape of the rows the response decoder produces for `column_count` columns.
    #[must_use]
    pub fn decoded(column_count: usize) -> Self {
        if column_count == 1 {
            RowShape::Scalar
        } else {
            RowShape::Sequence
        }
    }

    #[must_use]
    pub fn from_style(style: CursorStyle) -> Self {
        match style {
            CursorStyle::Object => RowShape::Scalar,
            CursorStyle::Record | CursorStyle::RecordProjection => RowShape::Record,
            CursorStyle::Array | CursorStyle::List => RowShape::Sequence,
            CursorStyle::Map => RowShape::Map,
        }
    }

    /// One accessor per column of `signature`.
    ///
    /// Records and maps are addressed by the cursor factory's field names when
    /// present, else by column name.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidAccessor` for a scalar shape over more than one column.
    pub fn accessors(self, signature: &Signature) -> Result<Vec<Accessor>, AccessError> {
        let field_names = signature
            .cursor_factory
            .as_ref()
            .map(|f| f.field_names.as_slice())
            .unwrap_or_default();
        let name = |i: usize| {
            field_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| signature.columns[i].column_name.clone())
        };

        (0..signature.column_count())
            .map(|i| match self {
                RowShape::Sequence => Ok(Accessor::Sequence(i)),
                RowShape::Scalar => Accessor::scalar(i),
                RowShape::Record => Ok(Accessor::Field(FieldDescriptor::new(name(i)))),
                RowShape::Map => Ok(Accessor::Key(name(i))),
            })
            .collect()
    }
}

/// Reads one column through a cursor and records whether it was null.
#[derive(Debug, Clone)]
pub struct Getter {
    accessor: Accessor,
    was_null: Arc<NullFlag>,
}

impl Getter {
    pub fn new(accessor: Accessor, was_null: Arc<NullFlag>) -> Self {
        Self { accessor, was_null }
    }

    #[must_use]
    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }

    /// Read the column from the cursor's current row.
    ///
    /// The null flag is updated on every call; a failed read clears it.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Access` for any failure of the underlying row.
    pub fn get<C: PositionedCursor + ?Sized>(&self, cursor: &C) -> Result<Value, AccessError> {
        let result = cursor
            .current()
            .map_err(|e| AccessError::Access(e.to_string()))
            .and_then(|row| self.accessor.read(row));
        self.was_null
            .set(matches!(&result, Ok(value) if value.is_null()));
        result
    }
}
