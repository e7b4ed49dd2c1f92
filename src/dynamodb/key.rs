use std::fmt;

use aws_sdk_dynamodb::types::AttributeValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Item;

pub const PARTITION_KEY_ATTRIBUTE: &str = "pk";
pub const SORT_KEY_ATTRIBUTE: &str = "sk";

/// Primary key of one item, stored under `pk` and `sk`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub partition_key: String,
    pub sort_key: String,
}

impl Key {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }

    /// Read the key back out of a document, if both attributes are strings.
    pub fn from_document(document: &Map<String, Value>) -> Option<Self> {
        let partition_key = document.get(PARTITION_KEY_ATTRIBUTE)?.as_str()?;
        let sort_key = document.get(SORT_KEY_ATTRIBUTE)?.as_str()?;
        Some(Self::new(partition_key, sort_key))
    }

    pub fn to_item(&self) -> Item {
        Item::from([
            (
                PARTITION_KEY_ATTRIBUTE.to_string(),
                AttributeValue::S(self.partition_key.clone()),
            ),
            (
                SORT_KEY_ATTRIBUTE.to_string(),
                AttributeValue::S(self.sort_key.clone()),
            ),
        ])
    }

    pub fn write_into(&self, document: &mut Map<String, Value>) {
        document.insert(
            PARTITION_KEY_ATTRIBUTE.to_string(),
            Value::String(self.partition_key.clone()),
        );
        document.insert(
            SORT_KEY_ATTRIBUTE.to_string(),
            Value::String(self.sort_key.clone()),
        );
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.sort_key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn round_trips_through_documents() {
        let key = Key::new("user#1", "profile");
        let mut document = Map::new();
        key.write_into(&mut document);

        assert_eq!(Value::Object(document.clone()), json!({"pk": "user#1", "sk": "profile"}));
        assert_eq!(Key::from_document(&document), Some(key));
    }

    #[test]
    fn missing_sort_key_is_not_a_key() {
        let document = json!({"pk": "user#1"});
        assert_eq!(Key::from_document(document.as_object().unwrap()), None);
    }

    #[test]
    fn deserializes_camel_case() {
        let key: Key =
            serde_json::from_value(json!({"partitionKey": "a", "sortKey": "b"})).unwrap();
        assert_eq!(key, Key::new("a", "b"));
        assert_eq!(key.to_item()["sk"], AttributeValue::S("b".to_string()));
    }
}
