use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::ExprError;

/// Comparison applied by a single [`FilterCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum OperatorKind {
    #[default]
    Equals,
    BeginsWith,
    Contains,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Between,
    AttributeNotExists,
    AttributeExists,
    AttributeType,
    Size,
}

impl OperatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Equals => "equals",
            OperatorKind::BeginsWith => "begins_with",
            OperatorKind::Contains => "contains",
            OperatorKind::NotEqual => "neq",
            OperatorKind::LessThan => "less_than",
            OperatorKind::LessOrEqual => "less_or_equal",
            OperatorKind::GreaterThan => "greater_than",
            OperatorKind::GreaterOrEqual => "greater_or_equal",
            OperatorKind::Between => "between",
            OperatorKind::AttributeNotExists => "attribute_not_exists",
            OperatorKind::AttributeExists => "attribute_exists",
            OperatorKind::AttributeType => "attribute_type",
            OperatorKind::Size => "size",
        }
    }

    /// Existence checks reference the attribute name only.
    pub fn takes_value(&self) -> bool {
        !matches!(
            self,
            OperatorKind::AttributeExists | OperatorKind::AttributeNotExists
        )
    }
}

impl FromStr for OperatorKind {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let operator = match s.trim().to_ascii_lowercase().as_str() {
            "" | "eq" | "equals" => OperatorKind::Equals,
            "begins_with" => OperatorKind::BeginsWith,
            "contains" => OperatorKind::Contains,
            "neq" => OperatorKind::NotEqual,
            "less_than" => OperatorKind::LessThan,
            "less_or_equal" => OperatorKind::LessOrEqual,
            "greater_than" => OperatorKind::GreaterThan,
            "greater_or_equal" => OperatorKind::GreaterOrEqual,
            "between" => OperatorKind::Between,
            "attribute_not_exists" => OperatorKind::AttributeNotExists,
            "attribute_exists" => OperatorKind::AttributeExists,
            "attribute_type" => OperatorKind::AttributeType,
            "size" => OperatorKind::Size,
            _ => {
                return Err(ExprError::UnknownOperator {
                    operator: s.to_string(),
                });
            }
        };
        Ok(operator)
    }
}

impl TryFrom<String> for OperatorKind {
    type Error = ExprError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Connective used to join key-condition or filter fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }

    pub fn join(&self, fragments: &[String]) -> String {
        fragments.join(&format!(" {} ", self.as_str()))
    }
}

impl FromStr for LogicalOperator {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("and") {
            Ok(LogicalOperator::And)
        } else if s.eq_ignore_ascii_case("or") {
            Ok(LogicalOperator::Or)
        } else {
            Err(ExprError::UnknownLogicalOperator {
                operator: s.to_string(),
            })
        }
    }
}

impl TryFrom<String> for LogicalOperator {
    type Error = ExprError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Ascending)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Descending)
        } else {
            Err(ExprError::UnknownSortOrder {
                sort: s.to_string(),
            })
        }
    }
}

impl TryFrom<String> for SortOrder {
    type Error = ExprError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub field: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub value2: Option<Value>,
    #[serde(default)]
    pub operator: OperatorKind,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: OperatorKind, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            value2: None,
            operator,
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, OperatorKind::Equals, value)
    }

    pub fn between(
        field: impl Into<String>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> Self {
        Self {
            value2: Some(upper.into()),
            ..Self::new(field, OperatorKind::Between, lower)
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(field, OperatorKind::AttributeExists, Value::Null)
    }

    pub fn not_exists(field: impl Into<String>) -> Self {
        Self::new(field, OperatorKind::AttributeNotExists, Value::Null)
    }
}

/// Partition key of a list query: a bare value stored under `pk`, or a
/// single `attribute -> value` pair for tables and indexes keyed differently.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum PartitionKey {
    Value(Value),
    Attribute { name: String, value: Value },
}

impl PartitionKey {
    pub const DEFAULT_ATTRIBUTE: &'static str = "pk";

    pub fn attribute(name: impl Into<String>, value: impl Into<Value>) -> Self {
        PartitionKey::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PartitionKey::Value(_) => Self::DEFAULT_ATTRIBUTE,
            PartitionKey::Attribute { name, .. } => name,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            PartitionKey::Value(value) | PartitionKey::Attribute { value, .. } => value,
        }
    }
}

impl TryFrom<Value> for PartitionKey {
    type Error = ExprError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => partition_key_from_map(map),
            other => Ok(PartitionKey::Value(other)),
        }
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        PartitionKey::Value(Value::String(value.to_string()))
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        PartitionKey::Value(Value::String(value))
    }
}

fn partition_key_from_map(map: Map<String, Value>) -> Result<PartitionKey, ExprError> {
    let len = map.len();
    let mut entries = map.into_iter();
    match (entries.next(), entries.next()) {
        (Some((name, value)), None) => Ok(PartitionKey::Attribute { name, value }),
        _ => Err(ExprError::InvalidPartitionKey {
            message: format!("expected a single attribute, got {len}"),
        }),
    }
}
