//! Streaming decoder for query responses.
//!
//! A response is a JSON document whose `rows` field holds an array of row
//! objects. Every column of a row is an object carrying its payload under a
//! `value` field:
//!
//! ```text
//! {"metadata": {...}, "rows": [{"users.id": {"value": 1}, "users.name": {"value": "a"}}, ...]}
//! ```
//!
//! Everything before `rows` is skipped. Rows are decoded one at a time against
//! the statement [`Signature`] and cut into pages by a [`FrameLimiter`]. The
//! decoder never holds more than the page being filled.

use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use tracing::{debug, trace};

use super::token::{JsonToken, JsonTokenReader};
use crate::error::DecodeError;
use crate::frame::{FrameLimiter, ResultPage};
use crate::types::{sql_type, ColumnMetaData, ColumnType, Rep, Row, Signature, Value};

const ROWS_KEY: &str = "rows";
const VALUE_KEY: &str = "value";
const MAX_DECIMAL_EXPONENT: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Not yet positioned inside the rows array.
    Start,
    /// Inside the rows array, which is open at the given depth.
    Rows { depth: usize },
    /// Terminal page produced, failure raised, or cancelled.
    Finished,
}

/// Cancellation check polled between rows.
pub type CancelCheck = Box<dyn Fn() -> bool + Send>;

/// Turns a response byte stream into result pages.
pub struct ResponseDecoder<R: Read> {
    tokens: JsonTokenReader<R>,
    signature: Arc<Signature>,
    limiter: Arc<dyn FrameLimiter>,
    state: DecoderState,
    /// The start token of the next row has already been consumed.
    pending_row: bool,
    offset: u64,
    cancelled: Option<CancelCheck>,
}

impl<R: Read> ResponseDecoder<R> {
    /// Create a decoder over `reader`.
    ///
    /// # Arguments
    ///
    /// * `reader` - Raw response bytes
    /// * `signature` - Column schema the rows are decoded against
    /// * `limiter` - Policy bounding each page
    pub fn new(reader: R, signature: Arc<Signature>, limiter: Arc<dyn FrameLimiter>) -> Self {
        Self {
            tokens: JsonTokenReader::new(reader),
            signature,
            limiter,
            state: DecoderState::Start,
            pending_row: false,
            offset: 0,
            cancelled: None,
        }
    }

    /// Stop decoding as soon as `check` returns true.
    ///
    /// The check runs before each row. A cancelled decoder yields no further pages.
    #[must_use]
    pub fn with_cancellation(mut self, check: CancelCheck) -> Self {
        self.cancelled = Some(check);
        self
    }

    /// Rows decoded so far.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether no further page will be produced.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == DecoderState::Finished
    }

    /// Decode the next page.
    ///
    /// Returns `Ok(None)` after the terminal page, or once cancelled. A page
    /// holds at least one row unless it is the terminal page.
    ///
    /// When a page fills up to the limiter's row bound the decoder looks one
    /// token ahead, so the page that empties the stream is already marked
    /// done. A page cut for any other reason (elapsed time) is returned
    /// without reading further input, and may be followed by an empty done page.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` for malformed input or undecodable values. After
    /// an error the decoder is finished.
    pub fn next_page(&mut self) -> Result<Option<ResultPage>, DecodeError> {
        match self.decode_page() {
            Ok(page) => Ok(page),
            Err(e) => {
                self.state = DecoderState::Finished;
                Err(e)
            }
        }
    }

    fn decode_page(&mut self) -> Result<Option<ResultPage>, DecodeError> {
        let rows_depth = match self.state {
            DecoderState::Finished => return Ok(None),
            DecoderState::Rows { depth } => depth,
            DecoderState::Start => match self.seek_to_rows()? {
                Some(depth) => {
                    self.state = DecoderState::Rows { depth };
                    depth
                }
                None => {
                    debug!("Response carries no rows field");
                    self.state = DecoderState::Finished;
                    return Ok(Some(ResultPage::empty_done(self.offset)));
                }
            },
        };

        let mut ctx = self.limiter.start();
        let mut rows = Vec::new();
        loop {
            if self.is_cancelled() {
                debug!(offset = self.offset, "Decoding cancelled");
                self.state = DecoderState::Finished;
                return Ok(None);
            }

            let has_row = if self.pending_row {
                self.pending_row = false;
                true
            } else {
                self.next_row_start()?
            };
            if !has_row {
                return Ok(Some(self.finish_page(rows, true)));
            }

            let row = self.read_row(rows_depth)?;
            ctx.add_row(&row);
            rows.push(row);
            self.offset += 1;

            if ctx.limit_reached() {
                break;
            }
        }

        // Only a full row-count page may wait on the next row; a page cut by
        // time ships now and the end of the stream follows as an empty done page.
        let row_bound_reached = self
            .limiter
            .row_count_limit()
            .is_some_and(|max| rows.len() >= max);
        if !row_bound_reached {
            return Ok(Some(self.finish_page(rows, false)));
        }

        if self.next_row_start()? {
            self.pending_row = true;
            Ok(Some(self.finish_page(rows, false)))
        } else {
            Ok(Some(self.finish_page(rows, true)))
        }
    }

    fn finish_page(&mut self, rows: Vec<Row>, done: bool) -> ResultPage {
        if done {
            self.state = DecoderState::Finished;
        }
        trace!(offset = self.offset, rows = rows.len(), done, "Decoded page");
        ResultPage::new(self.offset, done, rows)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.as_ref().is_some_and(|check| check())
    }

    /// Advance to the first element of the `rows` array.
    ///
    /// Returns the depth of the open array, or `None` if the document has no
    /// `rows` field.
    fn seek_to_rows(&mut self) -> Result<Option<usize>, DecodeError> {
        while let Some(token) = self.tokens.next_token()? {
            if token == JsonToken::FieldName(ROWS_KEY.to_string()) {
                return match self.tokens.next_token()? {
                    Some(JsonToken::StartArray) => Ok(Some(self.tokens.depth())),
                    Some(other) => Err(DecodeError::Malformed {
                        position: self.tokens.position(),
                        message: format!("expected rows array, found {}", other.kind_name()),
                    }),
                    None => Err(DecodeError::UnexpectedEof {
                        position: self.tokens.position(),
                        context: "rows".to_string(),
                    }),
                };
            }
        }
        Ok(None)
    }

    /// Consume the start of the next row. Returns false at the end of the rows array.
    fn next_row_start(&mut self) -> Result<bool, DecodeError> {
        match self.tokens.next_token()? {
            Some(JsonToken::StartObject) => Ok(true),
            Some(JsonToken::EndArray) | None => Ok(false),
            Some(other) => Err(DecodeError::Malformed {
                position: self.tokens.position(),
                message: format!("expected row object, found {}", other.kind_name()),
            }),
        }
    }

    fn read_row(&mut self, rows_depth: usize) -> Result<Row, DecodeError> {
        let row_depth = rows_depth + 1;
        let signature = Arc::clone(&self.signature);
        let mut values = Vec::with_capacity(signature.column_count());
        for column in &signature.columns {
            let token = self.seek_to_value(row_depth)?;
            let value = match token {
                JsonToken::StartArray => self.read_array(column)?,
                other => decode_value(&other, &column.column_type)?,
            };
            values.push(value);
        }
        self.tokens.skip_to_depth(rows_depth)?;
        Ok(Row::from_columns(values))
    }

    /// Advance past the next `value` field inside the current row and return its first token.
    fn seek_to_value(&mut self, row_depth: usize) -> Result<JsonToken, DecodeError> {
        loop {
            let token = self.tokens.next_token()?.ok_or(DecodeError::UnexpectedEof {
                position: self.tokens.position(),
                context: "row".to_string(),
            })?;
            if self.tokens.depth() < row_depth {
                return Err(DecodeError::Malformed {
                    position: self.tokens.position(),
                    message: format!(
                        "row ended before all {} columns were read",
                        self.signature.column_count()
                    ),
                });
            }
            if let JsonToken::FieldName(name) = &token {
                if name == VALUE_KEY {
                    return self.tokens.next_token()?.ok_or(DecodeError::UnexpectedEof {
                        position: self.tokens.position(),
                        context: "value".to_string(),
                    });
                }
            }
        }
    }

    fn read_array(&mut self, column: &ColumnMetaData) -> Result<Value, DecodeError> {
        let element_type = element_type(&column.column_type);
        let primitive = element_type.rep.is_primitive();
        let mut elements = Vec::new();
        loop {
            let token = self.tokens.next_token()?.ok_or(DecodeError::UnexpectedEof {
                position: self.tokens.position(),
                context: "ARRAY".to_string(),
            })?;
            match token {
                JsonToken::EndArray => break,
                JsonToken::StartArray => return Err(DecodeError::NestedArray),
                other => {
                    let value = decode_value(&other, element_type)?;
                    if primitive && value.is_null() {
                        return Err(DecodeError::NullInPrimitiveArray);
                    }
                    elements.push(value);
                }
            }
        }
        Ok(Value::Array(elements))
    }
}

/// Type describing the elements of an array column.
///
/// Array columns carry the element kind in `rep`; a column typed with the
/// generic `ARRAY` kind falls back to its component type.
fn element_type(column_type: &ColumnType) -> &ColumnType {
    match (&column_type.rep, &column_type.component) {
        (Rep::Array, Some(component)) => component,
        _ => column_type,
    }
}

/// Decode a single scalar token as a value of the given column type.
///
/// A null token decodes to [`Value::Null`] for every kind.
///
/// # Errors
///
/// Returns `DecodeError::UnsupportedRep` for kinds that cannot be read from the
/// stream, `DecodeError::UnexpectedToken` if the token does not fit the kind,
/// and `DecodeError::InvalidNumber` for numbers out of range.
pub fn decode_value(token: &JsonToken, column_type: &ColumnType) -> Result<Value, DecodeError> {
    if *token == JsonToken::Null {
        return Ok(Value::Null);
    }

    let rep = column_type.rep;
    match rep {
        Rep::PrimitiveBoolean | Rep::Boolean => decode_bool(token, rep).map(Value::Boolean),
        Rep::PrimitiveByte | Rep::Byte => {
            decode_integer::<i8>(numeric_only(token, rep)?, rep).map(Value::Byte)
        }
        Rep::PrimitiveShort | Rep::Short => {
            decode_integer::<i16>(numeric_only(token, rep)?, rep).map(Value::Short)
        }
        Rep::PrimitiveInt | Rep::Integer => {
            decode_integer::<i32>(numeric_or_string(token, rep)?, rep).map(Value::Int)
        }
        Rep::PrimitiveLong | Rep::Long => {
            decode_integer::<i64>(numeric_or_string(token, rep)?, rep).map(Value::Long)
        }
        Rep::PrimitiveFloat | Rep::Float => {
            let lexeme = numeric_only(token, rep)?;
            parse_float::<f32>(lexeme, rep).map(Value::Float)
        }
        Rep::PrimitiveDouble | Rep::Double => {
            let lexeme = numeric_or_string(token, rep)?;
            parse_float::<f64>(lexeme, rep).map(Value::Double)
        }
        Rep::String => match token {
            JsonToken::String(s) | JsonToken::Number(s) => Ok(Value::String(s.clone())),
            JsonToken::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(unexpected(rep, other)),
        },
        Rep::Number => {
            let lexeme = numeric_or_string(token, rep)?;
            parse_decimal(lexeme, rep).map(Value::Decimal)
        }
        Rep::Object => decode_object(token, column_type),
        _ => Err(DecodeError::UnsupportedRep {
            rep: rep.to_string(),
        }),
    }
}

/// Opaque objects are decoded by their SQL type code.
fn decode_object(token: &JsonToken, column_type: &ColumnType) -> Result<Value, DecodeError> {
    let rep = column_type.rep;
    match column_type.id {
        sql_type::INTEGER => decode_integer::<i32>(numeric_only(token, rep)?, rep).map(Value::Int),
        sql_type::BIGINT => {
            let lexeme = numeric_only(token, rep)?;
            let value = match BigInt::from_str(lexeme) {
                Ok(v) => v,
                Err(_) => parse_decimal(lexeme, rep)?
                    .with_scale(0)
                    .into_bigint_and_exponent()
                    .0,
            };
            Ok(Value::BigInt(value))
        }
        sql_type::DOUBLE => parse_float::<f64>(numeric_only(token, rep)?, rep).map(Value::Double),
        sql_type::DECIMAL | sql_type::NUMERIC => {
            parse_decimal(numeric_only(token, rep)?, rep).map(Value::Decimal)
        }
        _ => Err(DecodeError::UnsupportedRep {
            rep: rep.to_string(),
        }),
    }
}

fn decode_bool(token: &JsonToken, rep: Rep) -> Result<bool, DecodeError> {
    match token {
        JsonToken::Bool(b) => Ok(*b),
        JsonToken::Number(n) => Ok(parse_float::<f64>(n, rep)? != 0.0),
        JsonToken::String(s) => match s.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(DecodeError::InvalidNumber {
                rep: rep.to_string(),
                value: other.to_string(),
                message: "not a boolean".to_string(),
            }),
        },
        other => Err(unexpected(rep, other)),
    }
}

fn numeric_only(token: &JsonToken, rep: Rep) -> Result<&str, DecodeError> {
    match token {
        JsonToken::Number(n) => Ok(n),
        other => Err(unexpected(rep, other)),
    }
}

fn numeric_or_string(token: &JsonToken, rep: Rep) -> Result<&str, DecodeError> {
    match token {
        JsonToken::Number(n) => Ok(n),
        JsonToken::String(s) => Ok(s.trim()),
        other => Err(unexpected(rep, other)),
    }
}

/// Parse an integral value. Fractional lexemes are truncated toward zero.
fn decode_integer<T>(lexeme: &str, rep: Rep) -> Result<T, DecodeError>
where
    T: TryFrom<i64>,
{
    let wide = match lexeme.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            let f = parse_float::<f64>(lexeme, rep)?;
            if !f.is_finite() || f < i64::MIN as f64 || f >= i64::MAX as f64 {
                return Err(invalid_number(rep, lexeme, "out of range"));
            }
            f.trunc() as i64
        }
    };
    T::try_from(wide).map_err(|_| invalid_number(rep, lexeme, "out of range"))
}

fn parse_float<T: FromStr>(lexeme: &str, rep: Rep) -> Result<T, DecodeError> {
    lexeme
        .parse::<T>()
        .map_err(|_| invalid_number(rep, lexeme, "not a number"))
}

/// Decimals whose scale lies outside `-MAX_DECIMAL_EXPONENT..=MAX_DECIMAL_EXPONENT`
/// are rejected before any arithmetic touches them.
fn parse_decimal(lexeme: &str, rep: Rep) -> Result<BigDecimal, DecodeError> {
    let value =
        BigDecimal::from_str(lexeme).map_err(|e| invalid_number(rep, lexeme, &e.to_string()))?;
    let (_, scale) = value.as_bigint_and_exponent();
    if scale.unsigned_abs() > MAX_DECIMAL_EXPONENT {
        return Err(invalid_number(rep, lexeme, "exponent out of range"));
    }
    Ok(value)
}

fn invalid_number(rep: Rep, value: &str, message: &str) -> DecodeError {
    DecodeError::InvalidNumber {
        rep: rep.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

fn unexpected(rep: Rep, token: &JsonToken) -> DecodeError {
    DecodeError::UnexpectedToken {
        rep: rep.to_string(),
        found: token.kind_name().to_string(),
    }
}
