use std::{fmt::Display, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::{MySqlPool, types::Json};
use strum::IntoEnumIterator;

use crate::{
    error::{AppError, AppResult},
    model::enum_values,
};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Json(Value),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// A patchable field: camelCase JSON key and the column it writes.
pub type Field = (&'static str, &'static str);

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
///
/// Only keys listed in `fields` are accepted; column names never come from
/// the request body.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    fields: &[Field],
    id_column: &str,
    id_value: u64,
) -> AppResult<SqlUpdate> {
    let obj = as_object(payload)?;

    if obj.is_empty() {
        return Err(AppError::bad_request("No fields provided for update"));
    }

    let mut assignments = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let column = fields
            .iter()
            .find(|(json_key, _)| json_key == key)
            .map(|(_, column)| *column)
            .ok_or_else(|| AppError::bad_request(format!("Field '{key}' cannot be updated")))?;

        assignments.push(format!("{column} = ?"));
        values.push(to_sql_value(value));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        assignments.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                SqlValue::U64(u)
            } else if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else {
                SqlValue::F64(n.as_f64().unwrap_or_default())
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        Value::Array(_) | Value::Object(_) => SqlValue::Json(value.clone()),
    }
}

pub fn as_object(payload: &Value) -> AppResult<&Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| AppError::bad_request("Payload must be a JSON object"))
}

/// Checks that `key`, when present, holds one of `T`'s wire spellings.
pub fn ensure_enum_field<T>(payload: &Value, key: &str) -> AppResult<()>
where
    T: FromStr + IntoEnumIterator + Display,
{
    match payload.get(key) {
        None => Ok(()),
        Some(Value::String(s)) if s.parse::<T>().is_ok() => Ok(()),
        Some(_) => Err(AppError::bad_request(format!(
            "Invalid {key}. Must be one of: {}.",
            enum_values::<T>()
        ))),
    }
}

/// Checks that `key`, when present, deserializes as `T`.
pub fn ensure_field_shape<T: DeserializeOwned>(payload: &Value, key: &str) -> AppResult<()> {
    match payload.get(key) {
        None => Ok(()),
        Some(value) => serde_json::from_value::<T>(value.clone())
            .map(|_| ())
            .map_err(|e| AppError::bad_request(format!("Invalid {key}: {e}"))),
    }
}

/// Date under `key` as `YYYY-MM-DD`, or `fallback` when the key is absent.
pub fn date_field(payload: &Value, key: &str, fallback: NaiveDate) -> AppResult<NaiveDate> {
    match payload.get(key) {
        None => Ok(fallback),
        Some(value) => parse_date(value, key),
    }
}

/// Like [`date_field`] for nullable columns: `null` clears the date.
pub fn optional_date_field(
    payload: &Value,
    key: &str,
    fallback: Option<NaiveDate>,
) -> AppResult<Option<NaiveDate>> {
    match payload.get(key) {
        None => Ok(fallback),
        Some(Value::Null) => Ok(None),
        Some(value) => parse_date(value, key).map(Some),
    }
}

fn parse_date(value: &Value, key: &str) -> AppResult<NaiveDate> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .ok_or_else(|| AppError::bad_request(format!("Invalid {key}: expected YYYY-MM-DD")))
}

/// Row offset for a 1-based page. Pages past what MySQL can address are a
/// client error rather than an overflow.
pub fn page_offset(page: u64, per_page: u64) -> AppResult<i64> {
    page.max(1)
        .saturating_sub(1)
        .checked_mul(per_page)
        .and_then(|offset| i64::try_from(offset).ok())
        .ok_or_else(|| AppError::bad_request("page is out of range"))
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(Json(v)),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::ProjectStatus;
    use serde_json::json;

    const FIELDS: &[Field] = &[
        ("name", "name"),
        ("startDate", "start_date"),
        ("employees", "employees"),
    ];

    #[test]
    fn maps_json_keys_to_columns() {
        let payload = json!({ "startDate": "2026-04-01", "employees": [3, 4] });
        let update = build_update_sql("projects", &payload, FIELDS, "id", 9).unwrap();

        assert!(update.sql.starts_with("UPDATE projects SET "));
        assert!(update.sql.contains("start_date = ?"));
        assert!(update.sql.contains("employees = ?"));
        assert!(update.sql.ends_with("WHERE id = ?"));
        assert_eq!(update.values.len(), 3);
        assert!(update.values.contains(&SqlValue::Date(
            NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
        )));
        assert!(update.values.contains(&SqlValue::Json(json!([3, 4]))));
        assert_eq!(update.values.last(), Some(&SqlValue::U64(9)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let payload = json!({ "name": "x", "createdBy": 1 });
        let err = build_update_sql("projects", &payload, FIELDS, "id", 1).unwrap_err();
        assert_eq!(err.to_string(), "Field 'createdBy' cannot be updated");
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("projects", &json!({}), FIELDS, "id", 1).is_err());
        assert!(build_update_sql("projects", &json!([1, 2]), FIELDS, "id", 1).is_err());
    }

    #[test]
    fn enum_field_validation() {
        assert!(ensure_enum_field::<ProjectStatus>(&json!({}), "status").is_ok());
        assert!(ensure_enum_field::<ProjectStatus>(&json!({"status": "In Progress"}), "status").is_ok());

        let err = ensure_enum_field::<ProjectStatus>(&json!({"status": "Done"}), "status").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid status. Must be one of: Planning, In Progress, On Hold, Completed."
        );
    }

    #[test]
    fn patched_dates_fall_back_to_stored_values() {
        let stored = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        let payload = json!({ "endDate": "2026-05-09" });

        assert_eq!(date_field(&payload, "startDate", stored).unwrap(), stored);
        assert_eq!(
            date_field(&payload, "endDate", stored).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 9).unwrap()
        );
        assert!(date_field(&json!({ "endDate": 5 }), "endDate", stored).is_err());
        assert!(date_field(&json!({ "endDate": null }), "endDate", stored).is_err());
    }

    #[test]
    fn null_clears_an_optional_date() {
        let stored = NaiveDate::from_ymd_opt(2026, 9, 30);

        assert_eq!(optional_date_field(&json!({}), "endDate", stored).unwrap(), stored);
        assert_eq!(
            optional_date_field(&json!({ "endDate": null }), "endDate", stored).unwrap(),
            None
        );
        assert!(optional_date_field(&json!({ "endDate": "soon" }), "endDate", stored).is_err());
    }

    #[test]
    fn page_offsets() {
        assert_eq!(page_offset(1, 10).unwrap(), 0);
        assert_eq!(page_offset(0, 10).unwrap(), 0);
        assert_eq!(page_offset(3, 25).unwrap(), 50);
        assert_eq!(
            page_offset(u32::MAX as u64, 100).unwrap(),
            (u32::MAX as i64 - 1) * 100
        );

        let err = page_offset(u64::MAX, 100).unwrap_err();
        assert_eq!(err.to_string(), "page is out of range");
        assert!(page_offset(u64::MAX, 1).is_err());
    }

    #[test]
    fn field_shape_validation() {
        assert!(ensure_field_shape::<Vec<u64>>(&json!({"employees": [1, 2]}), "employees").is_ok());
        assert!(ensure_field_shape::<Vec<u64>>(&json!({"employees": ["a"]}), "employees").is_err());
    }
}
