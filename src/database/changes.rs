use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A typed value bound for a single column write
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Uuid(Option<Uuid>),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl ColumnValue {
    /// JSON form, matching what `row_to_json` returns for the column
    pub fn to_json(&self) -> Value {
        match self {
            ColumnValue::Text(Some(s)) => Value::String(s.clone()),
            ColumnValue::Uuid(Some(id)) => Value::String(id.to_string()),
            ColumnValue::Text(None) | ColumnValue::Uuid(None) => Value::Null,
            ColumnValue::Integer(n) => Value::from(*n),
            ColumnValue::Timestamp(ts) => Value::String(ts.to_rfc3339()),
        }
    }
}

/// Ordered column writes for an insert or update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    entries: Vec<(&'static str, ColumnValue)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing an earlier write to the same column
    pub fn set(&mut self, column: &'static str, value: ColumnValue) -> &mut Self {
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.entries.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(c, _)| *c).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, ColumnValue)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
