//! Forward-only cursor over a paged result stream.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_bigint::Sign;
use tracing::trace;

use super::accessor::{Getter, NullFlag, PositionedCursor, RowShape};
use crate::error::{AccessError, StreamError};
use crate::stream::ResultStream;
use crate::types::{Row, Signature, Value};

/// Cursor that pulls pages from a [`ResultStream`] as rows are consumed.
///
/// Typed getters follow the usual driver convention: a null column reads as
/// the type's zero value (or `None` for owned types) and [`ResultCursor::was_null`]
/// tells the two apart.
///
/// # Example
///
/// ```no_run
/// # use framestream::cursor::ResultCursor;
/// # async fn example(mut cursor: ResultCursor) -> Result<(), Box<dyn std::error::Error>> {
/// while cursor.next().await? {
///     let id = cursor.get_i64(0)?;
///     let name = cursor.get_string(1)?;
///     println!("{id}: {name:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ResultCursor {
    stream: ResultStream,
    signature: Arc<Signature>,
    getters: Vec<Getter>,
    was_null: Arc<NullFlag>,
    rows: std::vec::IntoIter<Row>,
    current: Option<Row>,
    row_number: u64,
    exhausted: bool,
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor")
            .field("columns", &self.signature.column_count())
            .field("row_number", &self.row_number)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl ResultCursor {
    /// Create a cursor over rows produced by the response decoder.
    ///
    /// The decoder emits scalar rows for single-column results and sequences
    /// otherwise, whatever cursor style the signature advertises. Use
    /// [`ResultCursor::with_shape`] for streams fed with other row shapes.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidAccessor` if the shape cannot address the columns.
    pub fn new(stream: ResultStream, signature: Arc<Signature>) -> Result<Self, AccessError> {
        let shape = RowShape::decoded(signature.column_count());
        Self::with_shape(stream, signature, shape)
    }

    /// Create a cursor reading rows of the given shape.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidAccessor` if `shape` cannot address every column.
    pub fn with_shape(
        stream: ResultStream,
        signature: Arc<Signature>,
        shape: RowShape,
    ) -> Result<Self, AccessError> {
        let was_null = Arc::new(NullFlag::default());
        let getters = shape
            .accessors(&signature)?
            .into_iter()
            .map(|accessor| Getter::new(accessor, Arc::clone(&was_null)))
            .collect();

        Ok(Self {
            stream,
            signature,
            getters,
            was_null,
            rows: Vec::new().into_iter(),
            current: None,
            row_number: 0,
            exhausted: false,
        })
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.signature.column_count()
    }

    /// Position of the column with the given name or label.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.signature.column_index(name)
    }

    /// Rows advanced over so far.
    #[must_use]
    pub fn row_number(&self) -> u64 {
        self.row_number
    }

    /// Advance to the next row, fetching the next page when needed.
    ///
    /// Returns false once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the stream's failure. The cursor is exhausted afterwards.
    pub async fn next(&mut self) -> Result<bool, StreamError> {
        loop {
            if let Some(row) = self.rows.next() {
                self.current = Some(row);
                self.row_number += 1;
                return Ok(true);
            }

            self.current = None;
            if self.exhausted {
                return Ok(false);
            }

            match self.stream.next_page().await {
                Ok(Some(page)) => {
                    trace!(offset = page.offset, rows = page.len(), done = page.done, "Fetched page");
                    self.exhausted = page.done;
                    self.rows = page.rows.into_iter();
                }
                Ok(None) => self.exhausted = true,
                Err(e) => {
                    self.exhausted = true;
                    return Err(e);
                }
            }
        }
    }

    /// Stop reading. Pages not yet fetched are discarded.
    pub fn close(&mut self) {
        self.stream.close();
        self.rows = Vec::new().into_iter();
        self.current = None;
        self.exhausted = true;
    }

    /// Whether the last value read was null.
    #[must_use]
    pub fn was_null(&self) -> bool {
        self.was_null.get()
    }

    /// Getter for a 0-based column.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Access` if the column does not exist.
    pub fn getter(&self, column: usize) -> Result<&Getter, AccessError> {
        self.getters.get(column).ok_or_else(|| {
            AccessError::Access(format!(
                "column {column} out of range for {} columns",
                self.getters.len()
            ))
        })
    }

    /// Raw value of a column.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Access` if the column cannot be read.
    pub fn get_value(&self, column: usize) -> Result<Value, AccessError> {
        self.getter(column)?.get(self)
    }

    /// # Errors
    ///
    /// Returns `AccessError::Conversion` for non-boolean, non-integral values.
    pub fn get_bool(&self, column: usize) -> Result<bool, AccessError> {
        match self.get_value(column)? {
            Value::Null => Ok(false),
            Value::Boolean(b) => Ok(b),
            other => to_i64(&other, "BOOLEAN").map(|v| v != 0),
        }
    }

    /// # Errors
    ///
    /// Returns `AccessError::Conversion` for non-numeric or out-of-range values.
    pub fn get_i32(&self, column: usize) -> Result<i32, AccessError> {
        let value = self.get_value(column)?;
        let wide = to_i64(&value, "INT")?;
        i32::try_from(wide).map_err(|_| conversion(&value, "INT"))
    }

    /// # Errors
    ///
    /// Returns `AccessError::Conversion` for non-numeric or out-of-range values.
    pub fn get_i64(&self, column: usize) -> Result<i64, AccessError> {
        to_i64(&self.get_value(column)?, "LONG")
    }

    /// # Errors
    ///
    /// Returns `AccessError::Conversion` for non-numeric values.
    pub fn get_f64(&self, column: usize) -> Result<f64, AccessError> {
        let value = self.get_value(column)?;
        match &value {
            Value::Null => Ok(0.0),
            Value::Byte(v) => Ok(f64::from(*v)),
            Value::Short(v) => Ok(f64::from(*v)),
            Value::Int(v) => Ok(f64::from(*v)),
            Value::Long(v) => Ok(*v as f64),
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Double(v) => Ok(*v),
            Value::Decimal(_) | Value::BigInt(_) => value
                .to_string()
                .parse::<f64>()
                .map_err(|_| conversion(&value, "DOUBLE")),
            _ => Err(conversion(&value, "DOUBLE")),
        }
    }

    /// String form of any scalar value; `None` for null.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Conversion` for arrays.
    pub fn get_string(&self, column: usize) -> Result<Option<String>, AccessError> {
        match self.get_value(column)? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            value @ Value::Array(_) => Err(conversion(&value, "STRING")),
            other => Ok(Some(other.to_string())),
        }
    }

    /// # Errors
    ///
    /// Returns `AccessError::Conversion` for non-numeric values.
    pub fn get_decimal(&self, column: usize) -> Result<Option<BigDecimal>, AccessError> {
        let value = self.get_value(column)?;
        let decimal = match &value {
            Value::Null => return Ok(None),
            Value::Decimal(d) => d.clone(),
            Value::BigInt(v) => BigDecimal::new(v.clone(), 0),
            Value::Byte(v) => BigDecimal::from(*v),
            Value::Short(v) => BigDecimal::from(*v),
            Value::Int(v) => BigDecimal::from(*v),
            Value::Long(v) => BigDecimal::from(*v),
            Value::Float(_) | Value::Double(_) | Value::String(_) => value
                .to_string()
                .parse::<BigDecimal>()
                .map_err(|_| conversion(&value, "DECIMAL"))?,
            _ => return Err(conversion(&value, "DECIMAL")),
        };
        Ok(Some(decimal))
    }

    /// # Errors
    ///
    /// Returns `AccessError::Conversion` for non-array values.
    pub fn get_array(&self, column: usize) -> Result<Option<Vec<Value>>, AccessError> {
        match self.get_value(column)? {
            Value::Null => Ok(None),
            Value::Array(items) => Ok(Some(items)),
            other => Err(conversion(&other, "ARRAY")),
        }
    }
}

impl PositionedCursor for ResultCursor {
    fn current(&self) -> Result<&Row, AccessError> {
        self.current.as_ref().ok_or(AccessError::NoCurrentRow)
    }
}

/// Integral view of a value. Fractional values are truncated toward zero.
fn to_i64(value: &Value, target: &str) -> Result<i64, AccessError> {
    match value {
        Value::Null => Ok(0),
        Value::Boolean(b) => Ok(i64::from(*b)),
        Value::Byte(v) => Ok(i64::from(*v)),
        Value::Short(v) => Ok(i64::from(*v)),
        Value::Int(v) => Ok(i64::from(*v)),
        Value::Long(v) => Ok(*v),
        Value::Float(v) => float_to_i64(f64::from(*v)).ok_or_else(|| conversion(value, target)),
        Value::Double(v) => float_to_i64(*v).ok_or_else(|| conversion(value, target)),
        Value::BigInt(v) => i64::try_from(v).map_err(|_| conversion(value, target)),
        Value::Decimal(d) => decimal_to_i64(d).ok_or_else(|| conversion(value, target)),
        _ => Err(conversion(value, target)),
    }
}

/// `2^63`, the first `f64` above `i64::MAX`.
const I64_END: f64 = 9_223_372_036_854_775_808.0;

fn float_to_i64(v: f64) -> Option<i64> {
    let int = v.trunc();
    // NaN fails both comparisons.
    (int >= -I64_END && int < I64_END).then_some(int as i64)
}

/// Integer part of `d`, sized from its digit count before any rescaling.
fn decimal_to_i64(d: &BigDecimal) -> Option<i64> {
    let (unscaled, scale) = d.as_bigint_and_exponent();
    if unscaled.sign() == Sign::NoSign {
        return Some(0);
    }
    let int_digits = i64::try_from(d.digits()).ok()?.checked_sub(scale)?;
    if int_digits <= 0 {
        return Some(0);
    }
    if int_digits > 19 {
        return None;
    }
    let (int, _) = d.with_scale(0).into_bigint_and_exponent();
    i64::try_from(&int).ok()
}

fn conversion(value: &Value, target: &str) -> AccessError {
    AccessError::Conversion {
        from: value.kind_name().to_string(),
        to: target.to_string(),
    }
}
