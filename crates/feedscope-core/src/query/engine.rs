use super::spec::{FilterPredicate, QuerySpec, RangeBounds};
use super::QueryError;
use crate::store::{CellValue, Column, ColumnKind, FeedTable};
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub data: Vec<Map<String, Value>>,
    /// Rows returned after every operation.
    pub count: usize,
    /// Rows in the unfiltered table.
    pub total: usize,
}

/// Run a query against the feed table: filter, sort, cap, then project.
pub fn search(table: &FeedTable, spec: &QuerySpec) -> Result<SearchResult, QueryError> {
    let mut rows: Vec<usize> = (0..table.len()).collect();

    for (name, predicate) in &spec.filters {
        let (index, column) = table.column(name).ok_or_else(|| QueryError::UnknownColumn {
            column: name.clone(),
            available: table.column_names(),
        })?;
        let matcher = Matcher::compile(column, predicate)?;
        rows.retain(|&row| matcher.matches(&table.rows()[row][index]));
    }

    if let Some(sort_by) = &spec.sort_by {
        let (index, _) = table.column(sort_by).ok_or_else(|| QueryError::UnknownSortColumn {
            column: sort_by.clone(),
            available: table.column_names(),
        })?;
        // `sort_by` is stable, which keeps ties in table order.
        rows.sort_by(|&a, &b| {
            sort_order(&table.rows()[a][index], &table.rows()[b][index], spec.desc)
        });
    }

    if let Some(k) = spec.top_k.filter(|&k| k > 0) {
        rows.truncate(k);
    }

    let projection = project(table, spec.columns.as_deref())?;

    let data: Vec<Map<String, Value>> = rows
        .iter()
        .map(|&row| {
            projection
                .iter()
                .map(|(name, index)| (name.clone(), table.rows()[row][*index].to_json()))
                .collect()
        })
        .collect();

    Ok(SearchResult {
        count: data.len(),
        total: table.len(),
        data,
    })
}

fn project(table: &FeedTable, columns: Option<&[String]>) -> Result<Vec<(String, usize)>, QueryError> {
    let Some(requested) = columns else {
        return Ok(table
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect());
    };

    let invalid: Vec<String> = requested
        .iter()
        .filter(|name| table.column(name).is_none())
        .cloned()
        .collect();
    if !invalid.is_empty() {
        return Err(QueryError::UnknownColumns {
            columns: invalid,
            available: table.column_names(),
        });
    }

    Ok(requested
        .iter()
        .filter_map(|name| table.column(name).map(|(i, _)| (name.clone(), i)))
        .collect())
}

/// Missing cells go last regardless of direction.
fn sort_order(a: &CellValue, b: &CellValue, desc: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.compare(b).unwrap_or(Ordering::Equal);
            if desc {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

/// A predicate bound to one column's kind.
enum Matcher {
    Contains(String),
    Exact(CellValue),
    AnyOf(Vec<CellValue>),
    Range(Vec<(&'static str, CellValue)>),
}

impl Matcher {
    fn compile(column: &Column, predicate: &FilterPredicate) -> Result<Self, QueryError> {
        Ok(match predicate {
            FilterPredicate::Equals(value) if column.kind.is_text() => {
                Matcher::Contains(value.to_text().to_lowercase())
            }
            FilterPredicate::Equals(value) => Matcher::Exact(coerce(value, column.kind)),
            FilterPredicate::OneOf(values) => {
                Matcher::AnyOf(values.iter().map(|v| coerce(v, column.kind)).collect())
            }
            FilterPredicate::Range(bounds) => Matcher::Range(compile_range(column, bounds)?),
        })
    }

    fn matches(&self, cell: &CellValue) -> bool {
        if cell.is_null() {
            return match self {
                Matcher::AnyOf(values) => values.iter().any(CellValue::is_null),
                Matcher::Range(bounds) => bounds.is_empty(),
                _ => false,
            };
        }
        match self {
            Matcher::Contains(needle) => match cell {
                CellValue::Text(text) => text.to_lowercase().contains(needle.as_str()),
                other => other.to_text().to_lowercase().contains(needle.as_str()),
            },
            Matcher::Exact(target) => cell.compare(target) == Some(Ordering::Equal),
            Matcher::AnyOf(values) => values
                .iter()
                .any(|v| cell.compare(v) == Some(Ordering::Equal)),
            Matcher::Range(bounds) => bounds.iter().all(|(name, bound)| {
                let Some(ord) = cell.compare(bound) else {
                    return false;
                };
                match *name {
                    "min" => ord != Ordering::Less,
                    "max" => ord != Ordering::Greater,
                    "gt" => ord == Ordering::Greater,
                    "lt" => ord == Ordering::Less,
                    _ => false,
                }
            }),
        }
    }
}

fn compile_range(
    column: &Column,
    bounds: &RangeBounds,
) -> Result<Vec<(&'static str, CellValue)>, QueryError> {
    bounds
        .iter()
        .map(|(name, raw)| {
            let bound = coerce(raw, column.kind);
            let comparable = match column.kind {
                ColumnKind::Integer | ColumnKind::Float => bound.as_f64().is_some(),
                ColumnKind::Boolean => matches!(bound, CellValue::Bool(_)),
                ColumnKind::Text => matches!(bound, CellValue::Text(_)),
            };
            if comparable {
                Ok((name, bound))
            } else {
                Err(QueryError::IncomparableBound {
                    column: column.name.clone(),
                    bound: name,
                    kind: column.kind,
                })
            }
        })
        .collect()
}

/// Bring a filter value to the column's kind where the text form allows it,
/// e.g. `"1920"` against an integer column.
fn coerce(value: &CellValue, kind: ColumnKind) -> CellValue {
    match (value, kind) {
        (CellValue::Text(s), ColumnKind::Integer | ColumnKind::Float) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(CellValue::Int)
                .or_else(|_| s.parse::<f64>().map(CellValue::Float))
                .unwrap_or_else(|_| value.clone())
        }
        (CellValue::Text(s), ColumnKind::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => CellValue::Bool(true),
            "false" => CellValue::Bool(false),
            _ => value.clone(),
        },
        (CellValue::Null, _) => CellValue::Null,
        (other, ColumnKind::Text) => CellValue::Text(other.to_text()),
        (other, _) => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_nulls_last_both_directions() {
        let one = CellValue::Int(1);
        let two = CellValue::Int(2);
        assert_eq!(sort_order(&one, &two, false), Ordering::Less);
        assert_eq!(sort_order(&one, &two, true), Ordering::Greater);
        assert_eq!(sort_order(&CellValue::Null, &one, false), Ordering::Greater);
        assert_eq!(sort_order(&CellValue::Null, &one, true), Ordering::Greater);
    }

    #[test]
    fn test_coerce_numeric_strings() {
        assert_eq!(coerce(&CellValue::Text("1920".into()), ColumnKind::Integer), CellValue::Int(1920));
        assert_eq!(coerce(&CellValue::Text("2.5".into()), ColumnKind::Float), CellValue::Float(2.5));
        assert_eq!(
            coerce(&CellValue::Text("wide".into()), ColumnKind::Integer),
            CellValue::Text("wide".into())
        );
        assert_eq!(coerce(&CellValue::Int(7), ColumnKind::Text), CellValue::Text("7".into()));
    }
}
