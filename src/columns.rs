//! Column-type dispatch: validation and normalization driven by a board's schema.
//!
//! Each concern is a single exhaustive `match` over [`ColumnType`], so adding
//! a column type fails to compile until every concern handles it.
use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::store::models::{ColumnDef, ColumnType, DataMap};

/// Fallback shown for status columns whose option list is empty.
pub const DEFAULT_STATUS_OPTIONS: [&str; 3] = ["חדש", "בעבודה", "הושלם"];

/// The values a select/status column offers.
///
/// Status columns with no configured options fall back to
/// [`DEFAULT_STATUS_OPTIONS`]; single-select columns offer exactly what is
/// configured, which may be nothing.
pub fn selectable_options(column: &ColumnDef) -> Vec<String> {
    if column.column_type == ColumnType::Status && column.options.options.is_empty() {
        return DEFAULT_STATUS_OPTIONS.iter().map(|s| s.to_string()).collect();
    }
    column.options.options.clone()
}

/// JavaScript-style falsiness: absent, null, `false`, `0` and `""` fail a
/// required check; empty arrays and objects pass.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Names of required columns whose submitted value is falsy, in column order.
pub fn missing_required(columns: &[ColumnDef], data: &DataMap) -> Vec<String> {
    columns
        .iter()
        .filter(|c| c.is_required)
        .filter(|c| data.get(&c.name).map(is_falsy).unwrap_or(true))
        .map(|c| c.name.clone())
        .collect()
}

/// Validate a full data map against a board's columns.
///
/// The required check runs first and reports every offending column at once;
/// shape checks follow for each present, non-null value. Keys with no
/// matching column are left alone.
pub fn validate_item_data(columns: &[ColumnDef], data: &DataMap) -> Result<()> {
    let missing = missing_required(columns, data);
    if !missing.is_empty() {
        return Err(StoreError::MissingRequired { missing });
    }
    for column in columns {
        if let Some(value) = data.get(&column.name) {
            if !value.is_null() {
                validate_value(column, value)?;
            }
        }
    }
    Ok(())
}

/// Shape check for one value against one column definition.
pub fn validate_value(column: &ColumnDef, value: &Value) -> Result<()> {
    let name = column.name.as_str();
    match column.column_type {
        ColumnType::Text => match value {
            Value::String(_) => Ok(()),
            _ => Err(StoreError::invalid_value(name, "expected a string")),
        },
        ColumnType::Number => match value {
            // Numeric strings are coerced by normalize_value; anything else
            // has no number interpretation.
            Value::Number(_) | Value::String(_) => Ok(()),
            _ => Err(StoreError::invalid_value(name, "expected a number")),
        },
        ColumnType::Date => match value {
            Value::String(s) if parse_date(s) => Ok(()),
            _ => Err(StoreError::invalid_value(name, "expected an ISO-8601 date")),
        },
        ColumnType::SingleSelect | ColumnType::Status => match value {
            Value::String(s) => {
                let allowed = selectable_options(column);
                if allowed.is_empty() || allowed.iter().any(|o| o == s) {
                    Ok(())
                } else {
                    Err(StoreError::invalid_value(
                        name,
                        format!("'{s}' is not one of the configured options"),
                    ))
                }
            }
            _ => Err(StoreError::invalid_value(name, "expected a string")),
        },
        ColumnType::MultiSelect => match value {
            Value::Array(entries) => {
                let allowed = &column.options.options;
                for entry in entries {
                    let Value::String(s) = entry else {
                        return Err(StoreError::invalid_value(name, "expected an array of strings"));
                    };
                    if !allowed.is_empty() && !allowed.iter().any(|o| o == s) {
                        return Err(StoreError::invalid_value(
                            name,
                            format!("'{s}' is not one of the configured options"),
                        ));
                    }
                }
                Ok(())
            }
            _ => Err(StoreError::invalid_value(name, "expected an array of strings")),
        },
        ColumnType::File | ColumnType::Image => match value {
            Value::Object(map)
                if map.get("name").is_some_and(Value::is_string)
                    && map.get("url").is_some_and(Value::is_string) =>
            {
                Ok(())
            }
            _ => Err(StoreError::invalid_value(name, "expected { name, url }")),
        },
        ColumnType::BoardLink => match value {
            Value::Null => Ok(()),
            Value::Number(n) if n.is_i64() => Ok(()),
            _ => Err(StoreError::invalid_value(name, "expected a linked item id or null")),
        },
    }
}

/// Normalize one value into the shape stored for its column type.
///
/// The only coercion is number parsing: a numeric string becomes a number,
/// an unparsable one becomes `0`. Every other type stores what it was given.
pub fn normalize_value(column: &ColumnDef, value: Value) -> Value {
    match column.column_type {
        ColumnType::Number => match value {
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Value::Number((f as i64).into())
                }
                Ok(f) => serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::Number(0.into())),
                Err(_) => Value::Number(0.into()),
            },
            other => other,
        },
        ColumnType::Text
        | ColumnType::Date
        | ColumnType::SingleSelect
        | ColumnType::MultiSelect
        | ColumnType::Status
        | ColumnType::File
        | ColumnType::Image
        | ColumnType::BoardLink => value,
    }
}

/// Normalize a full data map. Keys with no matching column pass through.
pub fn normalize_item_data(columns: &[ColumnDef], mut data: DataMap) -> DataMap {
    for column in columns {
        if let Some(value) = data.remove(&column.name) {
            data.insert(column.name.clone(), normalize_value(column, value));
        }
    }
    data
}

/// Toggle an option in a multi-select value: add if absent, remove if present.
pub fn toggle_multi_select(mut values: Vec<String>, option: &str) -> Vec<String> {
    if let Some(pos) = values.iter().position(|v| v == option) {
        values.remove(pos);
    } else {
        values.push(option.to_string());
    }
    values
}

fn parse_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::ColumnOptions;
    use serde_json::json;

    fn column(name: &str, column_type: ColumnType, required: bool) -> ColumnDef {
        ColumnDef {
            id: 0,
            board_id: 0,
            name: name.to_string(),
            column_type,
            column_order: 0,
            options: ColumnOptions::default(),
            is_required: required,
        }
    }

    fn data(entries: serde_json::Value) -> DataMap {
        entries.as_object().unwrap().clone()
    }

    #[test]
    fn test_missing_required_reports_falsy_values() {
        let columns = vec![
            column("name", ColumnType::Text, true),
            column("amount", ColumnType::Number, true),
            column("notes", ColumnType::Text, false),
        ];

        let submitted = data(json!({"name": "", "amount": 0, "notes": ""}));
        assert_eq!(missing_required(&columns, &submitted), vec!["name", "amount"]);

        let submitted = data(json!({"name": "Dana", "amount": 3}));
        assert!(missing_required(&columns, &submitted).is_empty());
    }

    #[test]
    fn test_empty_array_passes_required_check() {
        let columns = vec![column("tags", ColumnType::MultiSelect, true)];
        let submitted = data(json!({"tags": []}));
        assert!(missing_required(&columns, &submitted).is_empty());
    }

    #[test]
    fn test_status_falls_back_to_default_options() {
        let c = column("סטטוס", ColumnType::Status, false);
        assert_eq!(selectable_options(&c), DEFAULT_STATUS_OPTIONS.to_vec());

        let mut configured = column("stage", ColumnType::Status, false);
        configured.options = ColumnOptions::with_options(vec!["open".into(), "won".into()]);
        assert_eq!(selectable_options(&configured), vec!["open", "won"]);

        // Single-select has no fallback.
        let select = column("tier", ColumnType::SingleSelect, false);
        assert!(selectable_options(&select).is_empty());
    }

    #[test]
    fn test_status_validates_against_fallback() {
        let c = column("status", ColumnType::Status, false);
        assert!(validate_value(&c, &json!("בעבודה")).is_ok());
        assert!(validate_value(&c, &json!("archived")).is_err());
    }

    #[test]
    fn test_multi_select_membership() {
        let mut c = column("tags", ColumnType::MultiSelect, false);
        c.options = ColumnOptions::with_options(vec!["vip".into(), "churn".into()]);
        assert!(validate_value(&c, &json!(["vip"])).is_ok());
        assert!(validate_value(&c, &json!(["vip", "unknown"])).is_err());
        assert!(validate_value(&c, &json!("vip")).is_err());
    }

    #[test]
    fn test_toggle_is_self_inverse() {
        let toggled = toggle_multi_select(Vec::new(), "vip");
        assert_eq!(toggled, vec!["vip"]);
        let toggled = toggle_multi_select(toggled, "vip");
        assert!(toggled.is_empty());
    }

    #[test]
    fn test_number_normalization() {
        let c = column("amount", ColumnType::Number, false);
        assert_eq!(normalize_value(&c, json!("42")), json!(42));
        assert_eq!(normalize_value(&c, json!("2.5")), json!(2.5));
        assert_eq!(normalize_value(&c, json!("not a number")), json!(0));
        assert_eq!(normalize_value(&c, json!(7)), json!(7));
    }

    #[test]
    fn test_date_shapes() {
        let c = column("closed_on", ColumnType::Date, false);
        assert!(validate_value(&c, &json!("2026-03-01")).is_ok());
        assert!(validate_value(&c, &json!("2026-03-01T10:30:00Z")).is_ok());
        assert!(validate_value(&c, &json!("03/01/2026")).is_err());
        assert!(validate_value(&c, &json!(20260301)).is_err());
    }

    #[test]
    fn test_file_shape() {
        let c = column("contract", ColumnType::File, false);
        assert!(validate_value(&c, &json!({"name": "a.pdf", "url": "https://x/a.pdf"})).is_ok());
        assert!(validate_value(&c, &json!({"name": "a.pdf"})).is_err());
    }

    #[test]
    fn test_validate_item_data_required_first() {
        let columns = vec![
            column("name", ColumnType::Text, true),
            column("closed_on", ColumnType::Date, false),
        ];
        // Both a missing required field and a bad date: the required error wins
        // and carries the field list.
        let submitted = data(json!({"closed_on": "soon"}));
        match validate_item_data(&columns, &submitted) {
            Err(StoreError::MissingRequired { missing }) => assert_eq!(missing, vec!["name"]),
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let columns = vec![column("name", ColumnType::Text, true)];
        let submitted = data(json!({"name": "Dana", "legacy_field": {"weird": true}}));
        assert!(validate_item_data(&columns, &submitted).is_ok());
    }
}
