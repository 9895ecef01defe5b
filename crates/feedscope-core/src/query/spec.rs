use crate::store::CellValue;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Bounds of a range filter. Every present bound must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub min: Option<CellValue>,
    pub max: Option<CellValue>,
    pub gt: Option<CellValue>,
    pub lt: Option<CellValue>,
}

impl RangeBounds {
    pub fn min(mut self, value: impl Into<Value>) -> Self {
        self.min = CellValue::from_json(&value.into());
        self
    }

    pub fn max(mut self, value: impl Into<Value>) -> Self {
        self.max = CellValue::from_json(&value.into());
        self
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = CellValue::from_json(&value.into());
        self
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = CellValue::from_json(&value.into());
        self
    }

    /// Present bounds with their names, in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &CellValue)> {
        [
            ("min", self.min.as_ref()),
            ("max", self.max.as_ref()),
            ("gt", self.gt.as_ref()),
            ("lt", self.lt.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, bound)| bound.map(|b| (name, b)))
    }
}

/// One column predicate, resolved from the loosely typed tool arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPredicate {
    Equals(CellValue),
    OneOf(Vec<CellValue>),
    Range(RangeBounds),
}

impl FilterPredicate {
    pub fn equals(value: impl Into<Value>) -> Self {
        Self::from_json(&value.into()).unwrap_or(FilterPredicate::Equals(CellValue::Null))
    }

    pub fn one_of<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        FilterPredicate::OneOf(
            values
                .into_iter()
                .filter_map(|v| CellValue::from_json(&v.into()))
                .collect(),
        )
    }

    /// Scalar → `Equals`, array → `OneOf`, object → `Range`.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Err("filter value must not be null".to_string()),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    CellValue::from_json(item)
                        .ok_or_else(|| "list filters may only contain scalar values".to_string())
                })
                .collect::<Result<Vec<_>, _>>()
                .map(FilterPredicate::OneOf),
            Value::Object(bounds) => parse_range(bounds).map(FilterPredicate::Range),
            scalar => CellValue::from_json(scalar)
                .map(FilterPredicate::Equals)
                .ok_or_else(|| "unsupported filter value".to_string()),
        }
    }
}

fn parse_range(bounds: &Map<String, Value>) -> Result<RangeBounds, String> {
    let mut range = RangeBounds::default();
    for (key, raw) in bounds {
        let bound = match raw {
            Value::Null | Value::Array(_) | Value::Object(_) => {
                return Err(format!("range bound `{key}` must be a scalar"));
            }
            scalar => CellValue::from_json(scalar),
        };
        match key.as_str() {
            "min" => range.min = bound,
            "max" => range.max = bound,
            "gt" => range.gt = bound,
            "lt" => range.lt = bound,
            other => {
                return Err(format!(
                    "unknown range key `{other}` (expected min, max, gt or lt)"
                ))
            }
        }
    }
    Ok(range)
}

/// A parsed `feeds_search` request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuerySpec {
    /// Column predicates in request order.
    #[serde(default, deserialize_with = "deserialize_filters")]
    pub filters: Vec<(String, FilterPredicate)>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    /// Row cap applied after filtering and sorting. Zero means no cap.
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub desc: bool,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse tool-call arguments.
    pub fn from_args(args: Value) -> Result<Self, serde_json::Error> {
        match args {
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other),
        }
    }

    pub fn filter(mut self, column: impl Into<String>, predicate: FilterPredicate) -> Self {
        self.filters.push((column.into(), predicate));
        self
    }

    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn sort_by(mut self, column: impl Into<String>, desc: bool) -> Self {
        self.sort_by = Some(column.into());
        self.desc = desc;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }
}

fn deserialize_filters<'de, D>(deserializer: D) -> Result<Vec<(String, FilterPredicate)>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|(column, value)| {
            FilterPredicate::from_json(&value)
                .map(|p| (column.clone(), p))
                .map_err(|e| de::Error::custom(format!("filter on {column}: {e}")))
        })
        .collect()
}

// Models sometimes send `"desc": null`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_all_predicate_forms() {
        let spec = QuerySpec::from_args(json!({
            "filters": {
                "THEATER": "PAC",
                "CODEC": ["H264", "H265"],
                "RES_W": {"min": 1280, "lt": 4000}
            },
            "columns": ["FEED_ID"],
            "top_k": 5,
            "sort_by": "RES_W",
            "desc": true
        }))
        .unwrap();

        assert_eq!(spec.filters.len(), 3);
        assert_eq!(spec.filters[0].0, "THEATER");
        assert_eq!(
            spec.filters[0].1,
            FilterPredicate::Equals(CellValue::Text("PAC".into()))
        );
        assert_eq!(
            spec.filters[1].1,
            FilterPredicate::OneOf(vec![
                CellValue::Text("H264".into()),
                CellValue::Text("H265".into())
            ])
        );
        assert_eq!(
            spec.filters[2].1,
            FilterPredicate::Range(RangeBounds::default().min(1280).lt(4000))
        );
        assert_eq!(spec.columns, Some(vec!["FEED_ID".to_string()]));
        assert_eq!(spec.top_k, Some(5));
        assert!(spec.desc);
    }

    #[test]
    fn test_empty_and_null_arguments() {
        assert_eq!(QuerySpec::from_args(json!({})).unwrap(), QuerySpec::default());
        assert_eq!(QuerySpec::from_args(Value::Null).unwrap(), QuerySpec::default());
        let spec = QuerySpec::from_args(json!({"filters": null, "desc": null})).unwrap();
        assert!(spec.filters.is_empty());
        assert!(!spec.desc);
    }

    #[test]
    fn test_rejects_unknown_range_key_and_fields() {
        let err = QuerySpec::from_args(json!({"filters": {"RES_W": {"above": 3}}})).unwrap_err();
        assert!(err.to_string().contains("above"));

        assert!(QuerySpec::from_args(json!({"limit": 3})).is_err());
        assert!(QuerySpec::from_args(json!({"filters": {"THEATER": null}})).is_err());
    }
}
