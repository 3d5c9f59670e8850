//! Column metadata and statement signatures.
//!
//! A [`Signature`] is delivered by the backend as a JSON document when a query
//! is prepared. It is parsed once and then shared read-only between the
//! statement map and every decoder working on that statement.

use serde::{Deserialize, Deserializer, Serialize};

use super::rep::Rep;
use crate::error::StatementError;

/// Type descriptor of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnType {
    /// SQL type code (see [`crate::types::sql_type`]).
    pub id: i32,
    /// SQL type name as reported by the backend.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Representation kind; authoritative for decoding.
    pub rep: Rep,
    /// Element type for array columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Box<ColumnType>>,
}

impl ColumnType {
    /// Scalar column type.
    pub fn scalar(id: i32, name: impl Into<String>, rep: Rep) -> Self {
        Self {
            id,
            name: name.into(),
            rep,
            component: None,
        }
    }

    /// Array column type. Decoding uses the element kind `rep`.
    pub fn array(component: ColumnType, name: impl Into<String>, rep: Rep) -> Self {
        Self {
            id: super::rep::sql_type::ARRAY,
            name: name.into(),
            rep,
            component: Some(Box::new(component)),
        }
    }
}

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetaData {
    #[serde(default)]
    pub ordinal: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub column_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_nullable", deserialize_with = "nullable_or_unknown")]
    pub nullable: i32,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

fn default_nullable() -> i32 {
    // columnNullableUnknown
    2
}

/// Fields the backend may send as an explicit `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_or_unknown<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i32>::deserialize(deserializer)?.unwrap_or_else(default_nullable))
}

impl ColumnMetaData {
    /// Column with the given name and type.
    pub fn new(ordinal: usize, name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            ordinal,
            column_name: name.into(),
            label: None,
            nullable: default_nullable(),
            column_type,
        }
    }

    /// Column named after its representation kind, typed by the default code for that kind.
    pub fn of_rep(ordinal: usize, rep: Rep) -> Self {
        Self::new(
            ordinal,
            format!("col{ordinal}"),
            ColumnType::scalar(rep.default_type_id(), rep.wire_name(), rep),
        )
    }

    #[must_use]
    pub fn rep(&self) -> Rep {
        self.column_type.rep
    }

    #[must_use]
    pub fn type_id(&self) -> i32 {
        self.column_type.id
    }

    /// Label if the backend sent one, else the column name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.column_name)
    }
}

/// How the backend shapes each row object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CursorStyle {
    Object,
    Record,
    RecordProjection,
    Array,
    List,
    Map,
}

/// Cursor factory hint carried in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorFactory {
    pub style: CursorStyle,
    #[serde(
        default,
        rename = "fieldNames",
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub field_names: Vec<String>,
}

/// Ordered column schema of a prepared statement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub columns: Vec<ColumnMetaData>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_factory: Option<CursorFactory>,
}

impl Signature {
    /// Signature over the given columns.
    pub fn new(columns: Vec<ColumnMetaData>) -> Self {
        Self {
            columns,
            sql: None,
            cursor_factory: None,
        }
    }

    /// Parse a signature from its serialized JSON form.
    ///
    /// # Errors
    ///
    /// Returns `StatementError::InvalidSignature` if the document is not a valid signature.
    pub fn from_json(json: &str) -> Result<Self, StatementError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to the JSON form accepted by [`Signature::from_json`].
    ///
    /// # Errors
    ///
    /// Returns `StatementError::InvalidSignature` if serialization fails.
    pub fn to_json(&self) -> Result<String, StatementError> {
        Ok(serde_json::to_string(self)?)
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of the column with the given name or label.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.column_name == name || c.label.as_deref() == Some(name))
    }
}
