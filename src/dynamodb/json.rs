use std::{collections::HashMap, fmt, str::FromStr};

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

/// A stored item as the SDK sees it.
pub type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonConversionError {
    InvalidNumber { value: String },
    UnsupportedType { attribute_type: String },
}

impl fmt::Display for JsonConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonConversionError::InvalidNumber { value } => {
                write!(f, "invalid DynamoDB number: {value}")
            }
            JsonConversionError::UnsupportedType { attribute_type } => {
                write!(f, "unsupported DynamoDB attribute type: {attribute_type}")
            }
        }
    }
}

impl std::error::Error for JsonConversionError {}

type Result<T> = std::result::Result<T, JsonConversionError>;

/// Convert a stored item into a JSON document.
pub fn item_to_json(item: &Item) -> Result<Map<String, Value>> {
    let mut document = Map::with_capacity(item.len());
    for (key, attr_value) in item {
        document.insert(key.clone(), to_json_value(attr_value)?);
    }
    Ok(document)
}

/// Convert a JSON document into a storable item. Unlike condition values,
/// documents may nest objects, which become `M` attributes.
pub fn item_from_json(document: &Map<String, Value>) -> Item {
    document
        .iter()
        .map(|(key, value)| (key.clone(), from_json_value(value)))
        .collect()
}

fn from_json_value(value: &Value) -> AttributeValue {
    match value {
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::Bool(value) => AttributeValue::Bool(*value),
        Value::Null => AttributeValue::Null(true),
        Value::Array(values) => AttributeValue::L(values.iter().map(from_json_value).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(key, value)| (key.clone(), from_json_value(value)))
                .collect(),
        ),
    }
}

fn to_json_value(value: &AttributeValue) -> Result<Value> {
    match value {
        AttributeValue::Bool(bool_value) => Ok(Value::Bool(*bool_value)),
        AttributeValue::S(string_value) => Ok(Value::String(string_value.clone())),
        AttributeValue::N(number_value) => parse_number(number_value),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::L(list) => {
            let mut array = Vec::with_capacity(list.len());
            for element in list {
                array.push(to_json_value(element)?);
            }
            Ok(Value::Array(array))
        }
        AttributeValue::M(map) => {
            let mut object = Map::with_capacity(map.len());
            for (key, attribute_value) in map {
                object.insert(key.clone(), to_json_value(attribute_value)?);
            }
            Ok(Value::Object(object))
        }
        // Sets read back as plain arrays; writes never produce them.
        AttributeValue::Ss(set) => Ok(Value::Array(
            set.iter().map(|text| Value::String(text.clone())).collect(),
        )),
        AttributeValue::Ns(set) => {
            let mut array = Vec::with_capacity(set.len());
            for number in set {
                array.push(parse_number(number)?);
            }
            Ok(Value::Array(array))
        }
        AttributeValue::B(_) => Err(JsonConversionError::UnsupportedType {
            attribute_type: "B".to_string(),
        }),
        AttributeValue::Bs(_) => Err(JsonConversionError::UnsupportedType {
            attribute_type: "BS".to_string(),
        }),
        _ => Err(JsonConversionError::UnsupportedType {
            attribute_type: "Unknown".to_string(),
        }),
    }
}

fn parse_number(number_value: &str) -> Result<Value> {
    Number::from_str(number_value)
        .map(Value::Number)
        .map_err(|_| JsonConversionError::InvalidNumber {
            value: number_value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn attr_map(entries: Vec<(&str, AttributeValue)>) -> Item {
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }

    #[test]
    fn converts_basic_scalar_values() {
        let item = attr_map(vec![
            ("string", AttributeValue::S("hello".to_string())),
            ("bool_true", AttributeValue::Bool(true)),
            ("null", AttributeValue::Null(true)),
            ("int", AttributeValue::N("42".to_string())),
            ("float", AttributeValue::N("2.5".to_string())),
        ]);

        let document = item_to_json(&item).expect("conversion succeeds");

        assert_eq!(document["string"], json!("hello"));
        assert_eq!(document["bool_true"], json!(true));
        assert_eq!(document["null"], Value::Null);
        assert_eq!(document["int"], json!(42));
        assert_eq!(document["float"], json!(2.5));
    }

    #[test]
    fn nested_documents_become_maps() {
        let document = json!({
            "pk": "user#1",
            "meta": {"a": 1, "tags": ["x", null]}
        });
        let item = item_from_json(document.as_object().unwrap());

        let AttributeValue::M(meta) = &item["meta"] else {
            panic!("expected map attribute");
        };
        assert_eq!(meta["a"], AttributeValue::N("1".to_string()));
        assert_eq!(
            meta["tags"],
            AttributeValue::L(vec![
                AttributeValue::S("x".to_string()),
                AttributeValue::Null(true)
            ])
        );
        assert_eq!(item_to_json(&item).unwrap(), *document.as_object().unwrap());
    }

    #[test]
    fn string_sets_read_as_arrays() {
        let item = attr_map(vec![(
            "set",
            AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]),
        )]);
        assert_eq!(item_to_json(&item).unwrap()["set"], json!(["a", "b"]));
    }

    #[test]
    fn number_conversion_error_is_reported() {
        let item = attr_map(vec![("bad_number", AttributeValue::N("nope".to_string()))]);

        let error = item_to_json(&item).unwrap_err();
        assert_eq!(
            error,
            JsonConversionError::InvalidNumber {
                value: "nope".to_string()
            }
        );
    }

    #[test]
    fn binary_attributes_are_unsupported() {
        let item = attr_map(vec![(
            "blob",
            AttributeValue::B(aws_sdk_dynamodb::primitives::Blob::new(vec![1, 2])),
        )]);

        let error = item_to_json(&item).unwrap_err();
        assert_eq!(
            error,
            JsonConversionError::UnsupportedType {
                attribute_type: "B".to_string()
            }
        );
    }
}
