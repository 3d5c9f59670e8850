//! Value representation kinds and SQL type codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL type codes carried in column metadata.
///
/// These follow the standard JDBC numbering used on the wire. The decoder only
/// consults them to disambiguate [`Rep::Object`] columns.
pub mod sql_type {
    pub const BIT: i32 = -7;
    pub const TINYINT: i32 = -6;
    pub const SMALLINT: i32 = 5;
    pub const INTEGER: i32 = 4;
    pub const BIGINT: i32 = -5;
    pub const FLOAT: i32 = 6;
    pub const REAL: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const NUMERIC: i32 = 2;
    pub const DECIMAL: i32 = 3;
    pub const CHAR: i32 = 1;
    pub const VARCHAR: i32 = 12;
    pub const DATE: i32 = 91;
    pub const TIME: i32 = 92;
    pub const TIMESTAMP: i32 = 93;
    pub const BINARY: i32 = -2;
    pub const OTHER: i32 = 1111;
    pub const JAVA_OBJECT: i32 = 2000;
    pub const STRUCT: i32 = 2002;
    pub const ARRAY: i32 = 2003;
    pub const BOOLEAN: i32 = 16;
}

/// Decode-time representation of a column value.
///
/// `Primitive*` variants never hold null. Their boxed counterparts may. The
/// serialized names are the wire names used by column metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rep {
    PrimitiveBoolean,
    PrimitiveByte,
    PrimitiveChar,
    PrimitiveShort,
    PrimitiveInt,
    PrimitiveLong,
    PrimitiveFloat,
    PrimitiveDouble,
    Boolean,
    Byte,
    Character,
    Short,
    Integer,
    Long,
    Float,
    Double,
    #[serde(rename = "JAVA_SQL_TIME")]
    Time,
    #[serde(rename = "JAVA_SQL_TIMESTAMP")]
    Timestamp,
    #[serde(rename = "JAVA_SQL_DATE")]
    Date,
    #[serde(rename = "JAVA_UTIL_DATE")]
    UtilDate,
    ByteString,
    String,
    /// Arbitrary precision decimal.
    Number,
    Array,
    Multiset,
    Struct,
    /// Opaque object; the SQL type code decides how it is decoded.
    Object,
}

impl Rep {
    /// All representation kinds, in wire order.
    pub const ALL: [Rep; 27] = [
        Rep::PrimitiveBoolean,
        Rep::PrimitiveByte,
        Rep::PrimitiveChar,
        Rep::PrimitiveShort,
        Rep::PrimitiveInt,
        Rep::PrimitiveLong,
        Rep::PrimitiveFloat,
        Rep::PrimitiveDouble,
        Rep::Boolean,
        Rep::Byte,
        Rep::Character,
        Rep::Short,
        Rep::Integer,
        Rep::Long,
        Rep::Float,
        Rep::Double,
        Rep::Time,
        Rep::Timestamp,
        Rep::Date,
        Rep::UtilDate,
        Rep::ByteString,
        Rep::String,
        Rep::Number,
        Rep::Array,
        Rep::Multiset,
        Rep::Struct,
        Rep::Object,
    ];

    /// Whether values of this kind can never be null.
    #[must_use]
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            Rep::PrimitiveBoolean
                | Rep::PrimitiveByte
                | Rep::PrimitiveChar
                | Rep::PrimitiveShort
                | Rep::PrimitiveInt
                | Rep::PrimitiveLong
                | Rep::PrimitiveFloat
                | Rep::PrimitiveDouble
        )
    }

    /// Wire name of this kind, e.g. `PRIMITIVE_INT`.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Rep::PrimitiveBoolean => "PRIMITIVE_BOOLEAN",
            Rep::PrimitiveByte => "PRIMITIVE_BYTE",
            Rep::PrimitiveChar => "PRIMITIVE_CHAR",
            Rep::PrimitiveShort => "PRIMITIVE_SHORT",
            Rep::PrimitiveInt => "PRIMITIVE_INT",
            Rep::PrimitiveLong => "PRIMITIVE_LONG",
            Rep::PrimitiveFloat => "PRIMITIVE_FLOAT",
            Rep::PrimitiveDouble => "PRIMITIVE_DOUBLE",
            Rep::Boolean => "BOOLEAN",
            Rep::Byte => "BYTE",
            Rep::Character => "CHARACTER",
            Rep::Short => "SHORT",
            Rep::Integer => "INTEGER",
            Rep::Long => "LONG",
            Rep::Float => "FLOAT",
            Rep::Double => "DOUBLE",
            Rep::Time => "JAVA_SQL_TIME",
            Rep::Timestamp => "JAVA_SQL_TIMESTAMP",
            Rep::Date => "JAVA_SQL_DATE",
            Rep::UtilDate => "JAVA_UTIL_DATE",
            Rep::ByteString => "BYTE_STRING",
            Rep::String => "STRING",
            Rep::Number => "NUMBER",
            Rep::Array => "ARRAY",
            Rep::Multiset => "MULTISET",
            Rep::Struct => "STRUCT",
            Rep::Object => "OBJECT",
        }
    }

    /// Default SQL type code for a column of this kind.
    #[must_use]
    pub fn default_type_id(self) -> i32 {
        match self {
            Rep::PrimitiveBoolean | Rep::Boolean => sql_type::BOOLEAN,
            Rep::PrimitiveByte | Rep::Byte => sql_type::TINYINT,
            Rep::PrimitiveChar | Rep::Character => sql_type::CHAR,
            Rep::PrimitiveShort | Rep::Short => sql_type::SMALLINT,
            Rep::PrimitiveInt | Rep::Integer => sql_type::INTEGER,
            Rep::PrimitiveLong | Rep::Long => sql_type::BIGINT,
            Rep::PrimitiveFloat | Rep::Float => sql_type::REAL,
            Rep::PrimitiveDouble | Rep::Double => sql_type::DOUBLE,
            Rep::Time => sql_type::TIME,
            Rep::Timestamp | Rep::UtilDate => sql_type::TIMESTAMP,
            Rep::Date => sql_type::DATE,
            Rep::ByteString => sql_type::BINARY,
            Rep::String => sql_type::VARCHAR,
            Rep::Number => sql_type::DECIMAL,
            Rep::Array | Rep::Multiset => sql_type::ARRAY,
            Rep::Struct => sql_type::STRUCT,
            Rep::Object => sql_type::OTHER,
        }
    }
}

impl fmt::Display for Rep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
