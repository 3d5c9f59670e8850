//! Incremental JSON tokenizer.
//!
//! [`JsonTokenReader`] pulls one token at a time from any [`Read`] source and
//! never buffers more than the token being read, so a response of any size can
//! be decoded in constant memory. Numbers are handed out as their raw lexeme so
//! callers can pick the target precision themselves.

use std::io::{BufReader, Read};

use crate::error::DecodeError;

/// Longest numeric lexeme accepted, in characters.
pub const MAX_NUMBER_LEN: usize = 1000;

/// A single JSON token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonToken {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(String),
    String(String),
    /// Raw numeric lexeme, e.g. `-12.5e3`.
    Number(String),
    Bool(bool),
    Null,
}

impl JsonToken {
    /// Short description used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            JsonToken::StartObject => "START_OBJECT",
            JsonToken::EndObject => "END_OBJECT",
            JsonToken::StartArray => "START_ARRAY",
            JsonToken::EndArray => "END_ARRAY",
            JsonToken::FieldName(_) => "FIELD_NAME",
            JsonToken::String(_) => "VALUE_STRING",
            JsonToken::Number(_) => "VALUE_NUMBER",
            JsonToken::Bool(_) => "VALUE_BOOLEAN",
            JsonToken::Null => "VALUE_NULL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    /// Just opened, expecting a field name or `}`.
    ObjectStart,
    /// After a field name, expecting its value.
    ObjectValue,
    /// After a member, expecting `,` or `}`.
    ObjectNext,
    /// Just opened, expecting a value or `]`.
    ArrayStart,
    /// After an element, expecting `,` or `]`.
    ArrayNext,
}

impl Container {
    fn context(self) -> &'static str {
        match self {
            Container::ObjectStart | Container::ObjectValue | Container::ObjectNext => "OBJECT",
            Container::ArrayStart | Container::ArrayNext => "ARRAY",
        }
    }
}

/// Pull tokenizer over a byte stream.
pub struct JsonTokenReader<R: Read> {
    reader: BufReader<R>,
    peeked: Option<u8>,
    position: u64,
    stack: Vec<Container>,
}

impl<R: Read> JsonTokenReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            peeked: None,
            position: 0,
            stack: Vec::new(),
        }
    }

    /// Number of currently open objects and arrays.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next token.
    ///
    /// Returns `Ok(None)` once the input ends outside of any object or array.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::UnexpectedEof` if the input ends inside an open
    /// structure, `DecodeError::Malformed` for invalid JSON, and
    /// `DecodeError::Io` if the underlying reader fails.
    pub fn next_token(&mut self) -> Result<Option<JsonToken>, DecodeError> {
        let byte = self.next_non_whitespace()?;
        let top = match self.stack.last() {
            Some(top) => *top,
            None => {
                return match byte {
                    None => Ok(None),
                    Some(b) => self.read_value(b).map(Some),
                }
            }
        };

        let Some(b) = byte else {
            return Err(self.eof(top.context()));
        };

        let token = match (top, b) {
            (Container::ObjectStart | Container::ObjectNext, b'}') => {
                self.stack.pop();
                JsonToken::EndObject
            }
            (Container::ArrayStart | Container::ArrayNext, b']') => {
                self.stack.pop();
                JsonToken::EndArray
            }
            (Container::ObjectStart, b'"') => self.read_field_name()?,
            (Container::ObjectNext, b',') => match self.next_non_whitespace()? {
                Some(b'"') => self.read_field_name()?,
                Some(other) => return Err(self.unexpected(other, "field name")),
                None => return Err(self.eof("OBJECT")),
            },
            (Container::ObjectValue, b) => {
                self.set_top(Container::ObjectNext);
                self.read_value(b)?
            }
            (Container::ArrayStart, b) => {
                self.set_top(Container::ArrayNext);
                self.read_value(b)?
            }
            (Container::ArrayNext, b',') => match self.next_non_whitespace()? {
                Some(b) => {
                    self.set_top(Container::ArrayNext);
                    self.read_value(b)?
                }
                None => return Err(self.eof("ARRAY")),
            },
            (_, other) => return Err(self.unexpected(other, "',' or close marker")),
        };
        Ok(Some(token))
    }

    /// Consume the rest of a value whose first token was `first`.
    ///
    /// Scalars are already complete. For `StartObject`/`StartArray` this reads
    /// through the matching close marker.
    ///
    /// # Errors
    ///
    /// Propagates tokenizer errors, including end of input inside the value.
    pub fn skip_value(&mut self, first: &JsonToken) -> Result<(), DecodeError> {
        if matches!(first, JsonToken::StartObject | JsonToken::StartArray) {
            let target = self.depth() - 1;
            self.skip_to_depth(target)?;
        }
        Ok(())
    }

    /// Read tokens until the nesting depth drops to `depth`.
    ///
    /// # Errors
    ///
    /// Propagates tokenizer errors.
    pub fn skip_to_depth(&mut self, depth: usize) -> Result<(), DecodeError> {
        while self.depth() > depth {
            if self.next_token()?.is_none() {
                return Err(self.eof("OBJECT"));
            }
        }
        Ok(())
    }

    fn set_top(&mut self, state: Container) {
        if let Some(top) = self.stack.last_mut() {
            *top = state;
        }
    }

    fn read_field_name(&mut self) -> Result<JsonToken, DecodeError> {
        let name = self.read_string()?;
        match self.next_non_whitespace()? {
            Some(b':') => {}
            Some(other) => return Err(self.unexpected(other, "':'")),
            None => return Err(self.eof("OBJECT")),
        }
        self.set_top(Container::ObjectValue);
        Ok(JsonToken::FieldName(name))
    }

    fn read_value(&mut self, first: u8) -> Result<JsonToken, DecodeError> {
        match first {
            b'{' => {
                self.stack.push(Container::ObjectStart);
                Ok(JsonToken::StartObject)
            }
            b'[' => {
                self.stack.push(Container::ArrayStart);
                Ok(JsonToken::StartArray)
            }
            b'"' => Ok(JsonToken::String(self.read_string()?)),
            b't' => {
                self.expect_literal(b"rue")?;
                Ok(JsonToken::Bool(true))
            }
            b'f' => {
                self.expect_literal(b"alse")?;
                Ok(JsonToken::Bool(false))
            }
            b'n' => {
                self.expect_literal(b"ull")?;
                Ok(JsonToken::Null)
            }
            b'-' | b'0'..=b'9' => self.read_number(first),
            other => Err(self.unexpected(other, "value")),
        }
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let mut raw = vec![b'"'];
        let mut escaped = false;
        loop {
            let b = self.next_byte()?.ok_or_else(|| self.eof("STRING"))?;
            raw.push(b);
            match b {
                b'\\' => {
                    escaped = true;
                    let next = self.next_byte()?.ok_or_else(|| self.eof("STRING"))?;
                    raw.push(next);
                }
                b'"' => break,
                _ => {}
            }
        }

        if escaped {
            serde_json::from_slice::<String>(&raw).map_err(|e| self.malformed(e.to_string()))
        } else {
            let body = raw[1..raw.len() - 1].to_vec();
            String::from_utf8(body).map_err(|e| self.malformed(e.to_string()))
        }
    }

    fn read_number(&mut self, first: u8) -> Result<JsonToken, DecodeError> {
        let mut lexeme = String::new();
        lexeme.push(first as char);
        while let Some(b) = self.peek_byte()? {
            if b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-') {
                if lexeme.len() >= MAX_NUMBER_LEN {
                    return Err(self.malformed(format!(
                        "number longer than {MAX_NUMBER_LEN} characters"
                    )));
                }
                lexeme.push(b as char);
                self.peeked = None;
                self.position += 1;
            } else {
                break;
            }
        }
        if !is_json_number(&lexeme) {
            return Err(self.malformed(format!("invalid number '{lexeme}'")));
        }
        Ok(JsonToken::Number(lexeme))
    }

    fn expect_literal(&mut self, rest: &[u8]) -> Result<(), DecodeError> {
        for expected in rest {
            match self.next_byte()? {
                Some(b) if b == *expected => {}
                Some(b) => return Err(self.unexpected(b, "literal")),
                None => return Err(self.eof("literal")),
            }
        }
        Ok(())
    }

    fn next_non_whitespace(&mut self) -> Result<Option<u8>, DecodeError> {
        loop {
            match self.next_byte()? {
                Some(b' ' | b'\t' | b'\n' | b'\r') => continue,
                other => return Ok(other),
            }
        }
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        if self.peeked.is_none() {
            let mut buf = [0u8; 1];
            let n = self.reader.read(&mut buf)?;
            if n == 1 {
                self.peeked = Some(buf[0]);
            }
        }
        Ok(self.peeked)
    }

    fn next_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        let b = self.peek_byte()?;
        if b.is_some() {
            self.peeked = None;
            self.position += 1;
        }
        Ok(b)
    }

    fn eof(&self, context: &str) -> DecodeError {
        DecodeError::UnexpectedEof {
            position: self.position,
            context: context.to_string(),
        }
    }

    fn malformed(&self, message: String) -> DecodeError {
        DecodeError::Malformed {
            position: self.position,
            message,
        }
    }

    fn unexpected(&self, found: u8, expected: &str) -> DecodeError {
        self.malformed(format!(
            "unexpected character '{}', expected {expected}",
            found.escape_ascii()
        ))
    }
}

/// Check a lexeme against the JSON number grammar.
fn is_json_number(lexeme: &str) -> bool {
    let bytes = lexeme.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'-') {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_len = i - int_start;
    if int_len == 0 || (int_len > 1 && bytes[int_start] == b'0') {
        return false;
    }

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == frac_start {
            return false;
        }
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}
