//! Query result types.
//!
//! Defines the structures used to represent query results from the database
//! and their conversion into JSON row objects for the response payloads.

use serde_json::{Map, Number};
use std::fmt;
use std::time::Duration;

/// Represents the result of executing a SQL query.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,

    /// Time taken to execute the query.
    pub execution_time: Duration,

    /// Number of rows in the result (may be truncated).
    pub row_count: usize,

    /// Whether the result was truncated due to exceeding the row cap.
    pub was_truncated: bool,
}

impl QueryResult {
    /// Creates a query result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
            row_count,
            was_truncated: false,
        }
    }

    /// Converts the result into JSON row objects keyed by column name.
    pub fn to_row_objects(&self) -> Vec<Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(col, value)| (col.name.clone(), value.to_json()))
                    .collect()
            })
            .collect()
    }

    /// Renders the result as text for the agent's tool observation.
    ///
    /// Pipe-separated header and rows, with a truncation note when the row
    /// cap was hit.
    pub fn render_for_agent(&self) -> String {
        if self.columns.is_empty() {
            return format!("{} row(s) affected.", self.row_count);
        }

        let header = self
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(" | ");

        let mut out = format!("{}\n", header);
        for row in &self.rows {
            let line = row
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(" | ");
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&format!("({} rows)", self.row_count));
        if self.was_truncated {
            out.push_str(" [truncated]");
        }
        out
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type.
    pub data_type: String,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// Represents a single value from a database query.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),
}

impl Value {
    /// Returns the value as a display string.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }

    /// Converts the value into its JSON representation.
    ///
    /// Non-finite floats have no JSON encoding and map to null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> QueryResult {
        QueryResult::with_data(
            vec![
                ColumnInfo::new("category", "varchar"),
                ColumnInfo::new("product_count", "int8"),
            ],
            vec![
                vec![Value::from("Electronics"), Value::Int(3)],
                vec![Value::from("Books"), Value::Int(2)],
            ],
        )
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_display_string(), "NULL");
        assert_eq!(Value::Bool(true).to_display_string(), "true");
        assert_eq!(Value::Int(42).to_display_string(), "42");
        assert_eq!(Value::from("hello").to_display_string(), "hello");
    }

    #[test]
    fn test_value_to_json() {
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
        assert_eq!(Value::Int(42).to_json(), serde_json::json!(42));
        assert_eq!(Value::Bool(false).to_json(), serde_json::json!(false));
        assert_eq!(Value::from("hi").to_json(), serde_json::json!("hi"));
        // NaN has no JSON representation
        assert_eq!(Value::Float(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_to_row_objects() {
        let result = sample_result();
        let objects = result.to_row_objects();

        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0]["category"], serde_json::json!("Electronics"));
        assert_eq!(objects[0]["product_count"], serde_json::json!(3));
        assert_eq!(objects[1]["category"], serde_json::json!("Books"));
    }

    #[test]
    fn test_render_for_agent() {
        let result = sample_result();
        let rendered = result.render_for_agent();

        assert!(rendered.contains("category | product_count"));
        assert!(rendered.contains("Electronics | 3"));
        assert!(rendered.contains("(2 rows)"));
        assert!(!rendered.contains("[truncated]"));
    }

    #[test]
    fn test_render_for_agent_no_columns() {
        let result = QueryResult::default();
        assert_eq!(result.render_for_agent(), "0 row(s) affected.");
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(42i64)), Value::Int(42));
    }
}
