//! Feed records: a column-typed table of scalar cells.
//!
//! Column kinds are inferred once at load time so that the query engine can
//! decide between substring and exact matching without inspecting values.

use crate::error::{FeedError, Result};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    pub fn is_text(self) -> bool {
        self == ColumnKind::Text
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// A single scalar cell. `Null` stands for a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Convert a JSON scalar. Arrays and objects are not cells.
    pub fn from_json(value: &Value) -> Option<CellValue> {
        match value {
            Value::Null => Some(CellValue::Null),
            Value::Bool(b) => Some(CellValue::Bool(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => CellValue::Int(i),
                None => CellValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Some(CellValue::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Int(i) => Value::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The textual form used for substring matching.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Ordering between two non-null cells of comparable types.
    /// Returns `None` when the types cannot be compared.
    pub fn compare(&self, other: &CellValue) -> Option<Ordering> {
        match (self, other) {
            (CellValue::Text(a), CellValue::Text(b)) => Some(a.cmp(b)),
            (CellValue::Bool(a), CellValue::Bool(b)) => Some(a.cmp(b)),
            (CellValue::Int(a), CellValue::Int(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => Some(a.total_cmp(&b)),
                _ => None,
            },
        }
    }

    fn parse_as(raw: &str, kind: ColumnKind) -> CellValue {
        let raw = raw.trim();
        if raw.is_empty() {
            return CellValue::Null;
        }
        match kind {
            ColumnKind::Integer => raw.parse().map(CellValue::Int).unwrap_or(CellValue::Null),
            ColumnKind::Float => raw.parse().map(CellValue::Float).unwrap_or(CellValue::Null),
            ColumnKind::Boolean => parse_bool(raw).map(CellValue::Bool).unwrap_or(CellValue::Null),
            ColumnKind::Text => CellValue::Text(raw.to_string()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Infer the narrowest kind that every non-empty raw cell satisfies.
fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut non_empty = cells.filter(|c| !c.trim().is_empty()).peekable();
    if non_empty.peek().is_none() {
        return ColumnKind::Text;
    }
    let values: Vec<&str> = non_empty.map(str::trim).collect();
    if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        ColumnKind::Integer
    } else if values.iter().all(|v| v.parse::<f64>().is_ok()) {
        ColumnKind::Float
    } else if values.iter().all(|v| parse_bool(v).is_some()) {
        ColumnKind::Boolean
    } else {
        ColumnKind::Text
    }
}

/// Immutable table of feed records.
#[derive(Debug, Clone)]
pub struct FeedTable {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<CellValue>>,
}

impl FeedTable {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.name.clone(), i).is_some() {
                return Err(FeedError::Other(format!(
                    "duplicate feed column: {}",
                    column.name
                )));
            }
        }
        if let Some(pos) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(FeedError::Other(format!(
                "feed row {} has {} cells, expected {}",
                pos,
                rows[pos].len(),
                columns.len()
            )));
        }
        Ok(Self {
            columns,
            index,
            rows,
        })
    }

    /// Read a headed CSV document, inferring column kinds.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut raw_rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            row.resize(headers.len(), String::new());
            raw_rows.push(row);
        }

        let columns: Vec<Column> = headers
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column {
                kind: infer_kind(raw_rows.iter().map(|r| r[i].as_str())),
                name,
            })
            .collect();

        let rows = raw_rows
            .iter()
            .map(|raw| {
                raw.iter()
                    .zip(&columns)
                    .map(|(cell, column)| CellValue::parse_as(cell, column.kind))
                    .collect()
            })
            .collect();

        Self::new(columns, rows)
    }

    /// Build a table from JSON objects. Columns appear in first-seen order;
    /// a column holding any string becomes text.
    pub fn from_json_records(records: &[Value]) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        for record in records {
            let obj = record
                .as_object()
                .ok_or_else(|| FeedError::Other("feed record must be a JSON object".into()))?;
            for key in obj.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let cells: Vec<CellValue> = records
                .iter()
                .map(|r| match r.get(name) {
                    None => Ok(CellValue::Null),
                    Some(value) => CellValue::from_json(value).ok_or_else(|| {
                        FeedError::Other(format!("column {name} holds a non-scalar value"))
                    }),
                })
                .collect::<Result<_>>()?;
            columns.push(Column {
                name: name.clone(),
                kind: json_kind(&cells),
            });
        }

        let rows = records
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| {
                        let cell = r.get(&c.name).and_then(CellValue::from_json).unwrap_or(CellValue::Null);
                        coerce(cell, c.kind)
                    })
                    .collect()
            })
            .collect();

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Position and description of a column.
    pub fn column(&self, name: &str) -> Option<(usize, &Column)> {
        self.index.get(name).map(|&i| (i, &self.columns[i]))
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&self, row: usize) -> Option<Record<'_>> {
        self.rows.get(row).map(|cells| Record { table: self, cells })
    }
}

fn json_kind(cells: &[CellValue]) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for cell in cells {
        let this = match cell {
            CellValue::Null => continue,
            CellValue::Bool(_) => ColumnKind::Boolean,
            CellValue::Int(_) => ColumnKind::Integer,
            CellValue::Float(_) => ColumnKind::Float,
            CellValue::Text(_) => ColumnKind::Text,
        };
        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Integer), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Integer) => ColumnKind::Float,
            _ => ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

fn coerce(cell: CellValue, kind: ColumnKind) -> CellValue {
    match (cell, kind) {
        (CellValue::Null, _) => CellValue::Null,
        (CellValue::Int(i), ColumnKind::Float) => CellValue::Float(i as f64),
        (CellValue::Text(s), ColumnKind::Text) => CellValue::Text(s),
        (other, ColumnKind::Text) => CellValue::Text(other.to_text()),
        (other, _) => other,
    }
}

/// Borrowed view of one feed record.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    table: &'a FeedTable,
    cells: &'a [CellValue],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        self.table.index.get(column).map(|&i| &self.cells[i])
    }

    /// All columns, in table order.
    pub fn to_json(&self) -> Map<String, Value> {
        self.table
            .columns
            .iter()
            .zip(self.cells)
            .map(|(c, v)| (c.name.clone(), v.to_json()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "FEED_ID,THEATER,FRRATE,RES_W,CIV_OK\n\
                       1,PAC,29.97,1920,true\n\
                       2,EUR,30,1280,False\n\
                       3,,25,,\n";

    #[test]
    fn test_csv_kind_inference() {
        let table = FeedTable::from_csv(CSV.as_bytes()).unwrap();

        let kinds: Vec<ColumnKind> = table.columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Integer,
                ColumnKind::Text,
                ColumnKind::Float,
                ColumnKind::Integer,
                ColumnKind::Boolean,
            ]
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[1][4], CellValue::Bool(false));
        assert_eq!(table.rows()[2][1], CellValue::Null);
        assert_eq!(table.rows()[2][3], CellValue::Null);
    }

    #[test]
    fn test_record_lookup_and_json_order() {
        let table = FeedTable::from_csv(CSV.as_bytes()).unwrap();
        let record = table.record(0).unwrap();

        assert_eq!(record.get("THEATER"), Some(&CellValue::Text("PAC".into())));
        assert_eq!(record.get("MISSING"), None);

        let keys: Vec<String> = record.to_json().keys().cloned().collect();
        assert_eq!(keys, table.column_names());
    }

    #[test]
    fn test_json_records_mixed_numbers_become_float() {
        let records = vec![
            serde_json::json!({"ID": 1, "LAT_MS": 40}),
            serde_json::json!({"ID": 2, "LAT_MS": 42.5}),
        ];
        let table = FeedTable::from_json_records(&records).unwrap();
        let (_, lat) = table.column("LAT_MS").unwrap();
        assert_eq!(lat.kind, ColumnKind::Float);
        assert_eq!(table.rows()[0][1], CellValue::Float(40.0));
    }

    #[test]
    fn test_json_records_missing_key_is_null() {
        let records = vec![
            serde_json::json!({"ID": 1, "THEATER": "PAC"}),
            serde_json::json!({"ID": 2}),
        ];
        let table = FeedTable::from_json_records(&records).unwrap();
        let (_, theater) = table.column("THEATER").unwrap();
        assert_eq!(theater.kind, ColumnKind::Text);
        assert_eq!(table.rows()[1][1], CellValue::Null);
    }

    #[test]
    fn test_json_records_nested_value_rejected() {
        let records = vec![serde_json::json!({"ID": 1, "TAGS": ["a"]})];
        let err = FeedTable::from_json_records(&records).unwrap_err();
        assert!(err.to_string().contains("column TAGS holds a non-scalar value"));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let columns = vec![Column {
            name: "A".into(),
            kind: ColumnKind::Integer,
        }];
        let err = FeedTable::new(columns, vec![vec![CellValue::Int(1), CellValue::Int(2)]]);
        assert!(err.is_err());
    }
}
