use anyhow::{anyhow, Context, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};

/// Maps a JSON payload value onto SQLite storage. Arrays and objects are
/// stored as their JSON text.
pub fn json_to_sql(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(
                number
                    .as_f64()
                    .ok_or_else(|| anyhow!("number {number} is out of range"))?,
            ),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    })
}

/// Inverse of [`json_to_sql`], guided by the declared column type.
pub fn sql_to_json(value: ValueRef<'_>, decl_type: &str, column: &str) -> Result<Value> {
    let decl_type = decl_type.to_ascii_uppercase();
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(int) if decl_type == "BOOLEAN" => Value::Bool(int != 0),
        ValueRef::Integer(int) => Value::from(int),
        ValueRef::Real(real) => Number::from_f64(real)
            .map(Value::Number)
            .ok_or_else(|| anyhow!("column {column} holds non-finite value {real}"))?,
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .with_context(|| format!("column {column} is not valid UTF-8"))?;
            if decl_type == "JSON" {
                serde_json::from_str(text)
                    .with_context(|| format!("column {column} holds invalid JSON"))?
            } else {
                Value::String(text.to_string())
            }
        }
        ValueRef::Blob(_) => return Err(anyhow!("column {column} holds a blob")),
    })
}

pub fn into_object(row: Value, table: &str) -> Result<Map<String, Value>> {
    match row {
        Value::Object(object) => Ok(object),
        other => Err(anyhow!("payload for {table} must be an object, got {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_keep_integer_storage_when_possible() {
        assert_eq!(json_to_sql(&json!(42)).unwrap(), SqlValue::Integer(42));
        assert_eq!(json_to_sql(&json!(1.5)).unwrap(), SqlValue::Real(1.5));
        assert_eq!(json_to_sql(&json!(true)).unwrap(), SqlValue::Integer(1));
    }

    #[test]
    fn json_columns_round_through_text() {
        let links = json!(["https://a.example", "https://b.example"]);
        let stored = json_to_sql(&links).unwrap();
        let SqlValue::Text(text) = stored else {
            panic!("expected text storage");
        };
        let restored = sql_to_json(ValueRef::Text(text.as_bytes()), "json", "enlaces").unwrap();
        assert_eq!(restored, links);
    }

    #[test]
    fn plain_text_columns_stay_strings() {
        let value = sql_to_json(ValueRef::Text(b"[not parsed]"), "TEXT", "bio").unwrap();
        assert_eq!(value, Value::String("[not parsed]".into()));
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(into_object(json!([1, 2]), "perfil").is_err());
        assert!(into_object(json!({ "id": "x" }), "perfil").is_ok());
    }
}
