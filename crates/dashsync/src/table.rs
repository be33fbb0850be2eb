use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An in-memory row-oriented dataset, the unit of exchange between
/// connectors, transforms and the data directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build a table from JSON records.
    ///
    /// Columns appear in the order their keys are first seen; a record
    /// missing a column gets `null` in that cell.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Map<String, Value>>,
    {
        let records: Vec<Map<String, Value>> = records.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|c| record.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Build a table from a JSON array of objects. Non-object entries are
    /// rejected with a description of the offending element.
    pub fn from_json_records(values: Vec<Value>) -> Result<Self, String> {
        let mut records = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            match value {
                Value::Object(map) => records.push(map),
                other => {
                    return Err(format!(
                        "row {i} is not an object (got {})",
                        json_type_name(&other)
                    ));
                }
            }
        }
        Ok(Self::from_records(records))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when there is nothing to persist: no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
