use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Value};

use super::ExprError;

/// Encode a condition value. Objects are rejected: condition values are
/// scalars or lists of scalars, never documents.
pub fn encode(value: &Value) -> Result<AttributeValue, ExprError> {
    match value {
        Value::String(text) => Ok(AttributeValue::S(text.clone())),
        Value::Number(number) => Ok(AttributeValue::N(number.to_string())),
        Value::Bool(value) => Ok(AttributeValue::Bool(*value)),
        Value::Null => Ok(AttributeValue::Null(true)),
        Value::Array(values) => {
            let mut list = Vec::with_capacity(values.len());
            for value in values {
                list.push(encode(value)?);
            }
            Ok(AttributeValue::L(list))
        }
        Value::Object(_) => Err(ExprError::UnsupportedValueType {
            value_type: value_type_name(value).to_string(),
        }),
    }
}

/// Encode a key or pagination cursor, one attribute at a time.
pub fn encode_key(key: &Map<String, Value>) -> Result<HashMap<String, AttributeValue>, ExprError> {
    let mut result = HashMap::with_capacity(key.len());
    for (name, value) in key {
        result.insert(name.clone(), encode(value)?);
    }
    Ok(result)
}

pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
