//! Schema reflection over a generic query capability

use base64::{engine::general_purpose::STANDARD, Engine};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;

use crate::error::{VaultError, VaultResult};

/// A single value as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// CSV rendering: null is empty, text is unconverted, blobs are base64
    ///
    /// Whole reals keep a `.0` so they read back as reals.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.1}", f),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Blob(b) => STANDARD.encode(b),
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            Value::Null => ValueRef::Null,
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(f) => ValueRef::Real(*f),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        }))
    }
}

/// Column type affinity, derived from the declared type
///
/// Follows SQLite's rules, except that a declared `BLOB` is kept apart from
/// a column with no declared type: the first carries base64 in CSV, the
/// second whatever value was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Numeric,
    Text,
    Blob,
    Untyped,
}

impl Affinity {
    /// Affinity of a column declared as `declared`
    pub fn from_declared(declared: &str) -> Self {
        let declared = declared.trim().to_ascii_uppercase();
        if declared.contains("INT") {
            Affinity::Integer
        } else if ["CHAR", "CLOB", "TEXT"].iter().any(|t| declared.contains(t)) {
            Affinity::Text
        } else if declared.contains("BLOB") {
            Affinity::Blob
        } else if declared.is_empty() {
            Affinity::Untyped
        } else if ["REAL", "FLOA", "DOUB"].iter().any(|t| declared.contains(t)) {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }
}

/// What the importer needs to know about one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnType {
    pub affinity: Affinity,
    pub not_null: bool,
}

impl ColumnType {
    /// Turn a CSV field back into the value to bind for this column
    ///
    /// An empty field is NULL, except in a `NOT NULL` text column where it
    /// is the empty string. Blob columns decode base64 and keep fields that
    /// are not base64 as text. Untyped columns get back integers and reals
    /// written the way export renders them; the store's affinity converts
    /// everything else.
    pub fn parse_field(&self, field: &str) -> Value {
        if field.is_empty() {
            return if self.not_null && self.affinity == Affinity::Text {
                Value::Text(String::new())
            } else {
                Value::Null
            };
        }

        match self.affinity {
            Affinity::Blob => STANDARD
                .decode(field)
                .map(Value::Blob)
                .unwrap_or_else(|_| Value::Text(field.to_string())),
            Affinity::Untyped => {
                parse_number(field).unwrap_or_else(|| Value::Text(field.to_string()))
            }
            _ => Value::Text(field.to_string()),
        }
    }
}

/// An integer or finite real whose rendering is exactly `field`
fn parse_number(field: &str) -> Option<Value> {
    if let Ok(i) = field.parse::<i64>() {
        if i.to_string() == field {
            return Some(Value::Integer(i));
        }
    }

    let f = field.parse::<f64>().ok().filter(|f| f.is_finite())?;
    let value = Value::Real(f);
    (value.render() == field).then_some(value)
}

/// Ordered columns plus rows, as produced by one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Run a read query and get its ordered columns and rows
pub trait QueryCapability {
    fn query(&self, sql: &str) -> VaultResult<QueryResult>;
}

/// Insert a batch of rows in one transaction
///
/// Either every row is committed or none is.
pub trait InsertCapability {
    fn insert_all(&self, table: &str, columns: &[String], rows: &[Vec<Value>])
        -> VaultResult<usize>;
}

/// A table name, its ordered column list and the type of each column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<String>,
    pub types: Vec<ColumnType>,
}

impl TableSchema {
    /// Position of `column`, compared case-insensitively like SQLite does
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }
}

/// Rows of a table in schema column order
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub schema: TableSchema,
    pub rows: Vec<Vec<Value>>,
}

/// Derives table schemas from the store itself
pub struct SchemaReflector<'a> {
    source: &'a dyn QueryCapability,
}

impl<'a> SchemaReflector<'a> {
    /// Create a reflector over a query capability
    pub fn new(source: &'a dyn QueryCapability) -> Self {
        Self { source }
    }

    /// Names of all user tables, sorted
    pub fn tables(&self) -> VaultResult<Vec<String>> {
        let result = self.source.query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;

        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(Value::Text(name)) => Some(name),
                _ => None,
            })
            .collect())
    }

    /// Resolve `table` to its stored name, or fail with `NotFound`
    fn resolve(&self, table: &str) -> VaultResult<String> {
        self.tables()?
            .into_iter()
            .find(|t| t.eq_ignore_ascii_case(table))
            .ok_or_else(|| VaultError::table_not_found(table))
    }

    /// Ordered column list of `table`, with declared types
    pub fn schema(&self, table: &str) -> VaultResult<TableSchema> {
        let table = self.resolve(table)?;
        let info = self
            .source
            .query(&format!("PRAGMA table_info({})", quote_ident(&table)))?;

        let field = |name: &str| {
            info.columns.iter().position(|c| c == name).ok_or_else(|| {
                VaultError::Store(format!("table_info for {} has no {} column", table, name))
            })
        };
        let (name_at, type_at, not_null_at) = (field("name")?, field("type")?, field("notnull")?);

        let mut columns = Vec::with_capacity(info.rows.len());
        let mut types = Vec::with_capacity(info.rows.len());
        for row in &info.rows {
            let Some(Value::Text(name)) = row.get(name_at) else {
                continue;
            };
            let declared = match row.get(type_at) {
                Some(Value::Text(declared)) => declared.as_str(),
                _ => "",
            };
            columns.push(name.clone());
            types.push(ColumnType {
                affinity: Affinity::from_declared(declared),
                not_null: matches!(row.get(not_null_at), Some(Value::Integer(n)) if *n != 0),
            });
        }

        Ok(TableSchema {
            table,
            columns,
            types,
        })
    }

    /// All rows of `table`, selected in schema column order
    pub fn read(&self, table: &str) -> VaultResult<TableData> {
        let schema = self.schema(table)?;
        let column_list = schema
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let result = self.source.query(&format!(
            "SELECT {} FROM {}",
            column_list,
            quote_ident(&schema.table)
        ))?;

        Ok(TableData {
            schema,
            rows: result.rows,
        })
    }
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
