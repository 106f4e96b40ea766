//! Driver-native scalar values and result records.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A dynamically-typed SQL value, as stored by the driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

// SQLite convention: booleans are stored as integers 0/1.
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T> From<Option<T>> for Value
where
    Value: From<T>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => Value::from(inner),
            None => Value::Null,
        }
    }
}

/// Build a `[Value; N]` argument list from Rust literals.
///
/// ```
/// use dbkit::args;
/// let params = args![1, "alice", 3.5];
/// assert_eq!(params.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {{
        let empty: [$crate::Value; 0] = [];
        empty
    }};
    ($($v:expr),+ $(,)?) => {
        [$($crate::Value::from($v)),+]
    };
}

/// Column metadata shared by all rows of one result set.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row of a query result: an ordered column-name to value mapping.
///
/// Column metadata is shared across all rows of one result set via `Arc`.
/// Rows are immutable after construction.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<ColumnInfo>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Value by column position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    /// Iterate `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        let columns = Arc::new(ColumnInfo::new(vec![
            "id".to_string(),
            "name".to_string(),
            "score".to_string(),
        ]));
        Row::new(
            columns,
            vec![
                Value::Integer(7),
                Value::Text("alice".to_string()),
                Value::Null,
            ],
        )
    }

    #[test]
    fn value_conversions() {
        assert_eq!(Value::from(42), Value::Integer(42));
        assert_eq!(Value::from(true), Value::Integer(1));
        assert_eq!(Value::from("x"), Value::Text("x".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(2.5)), Value::Real(2.5));
    }

    #[test]
    fn args_macro() {
        let params = args![1, "a"];
        assert_eq!(params[0], Value::Integer(1));
        assert_eq!(params[1], Value::Text("a".to_string()));
        let empty = args![];
        assert!(empty.is_empty());
    }

    #[test]
    fn row_access_by_name_and_index() {
        let row = sample_row();
        assert_eq!(row.get("id"), Some(&Value::Integer(7)));
        assert_eq!(row.get("name").and_then(|v| v.as_text()), Some("alice"));
        assert_eq!(row.get_index(2), Some(&Value::Null));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn row_preserves_column_order() {
        let row = sample_row();
        let names: Vec<&str> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "name", "score"]);
    }

    #[test]
    fn row_serializes_as_object() {
        let row = sample_row();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":7,"name":"alice","score":null}"#);
    }
}
