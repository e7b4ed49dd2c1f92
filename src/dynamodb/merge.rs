//! Update-merge engine.
//!
//! Computes the attributes to write for a partial update, given the item as
//! it was last read. The merged map only carries the attributes named in the
//! update plus `updated_at`; callers overlay it onto the stored item.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::expr::ExprError;

pub const UPDATED_AT: &str = "updated_at";

/// How a single attribute of an update document is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateDirective {
    /// Overwrite the attribute wholesale.
    Replace(Value),
    /// Treat the attribute as a set: union with `add`, then subtract `remove`.
    ArrayMerge { add: Vec<Value>, remove: Vec<Value> },
    /// Deep-merge `add` into the attribute, then delete the dotted `remove` path.
    ObjectMerge {
        add: Option<Map<String, Value>>,
        remove: Option<String>,
    },
}

/// Ordered list of attribute directives. Order matters when the same
/// attribute appears more than once.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct UpdateDocument {
    directives: Vec<(String, UpdateDirective)>,
}

impl UpdateDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(attribute, UpdateDirective::Replace(value.into()));
        self
    }

    pub fn array_merge(
        mut self,
        attribute: impl Into<String>,
        add: Vec<Value>,
        remove: Vec<Value>,
    ) -> Self {
        self.push(attribute, UpdateDirective::ArrayMerge { add, remove });
        self
    }

    pub fn object_add(mut self, attribute: impl Into<String>, add: Map<String, Value>) -> Self {
        self.push(
            attribute,
            UpdateDirective::ObjectMerge {
                add: Some(add),
                remove: None,
            },
        );
        self
    }

    pub fn object_remove(mut self, attribute: impl Into<String>, path: impl Into<String>) -> Self {
        self.push(
            attribute,
            UpdateDirective::ObjectMerge {
                add: None,
                remove: Some(path.into()),
            },
        );
        self
    }

    pub fn push(&mut self, attribute: impl Into<String>, directive: UpdateDirective) {
        self.directives.push((attribute.into(), directive));
    }

    pub fn directives(&self) -> &[(String, UpdateDirective)] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Classify a loosely shaped JSON update by inspecting each value:
    /// `add`/`remove` arrays become set merges, an object `add` or a string
    /// `remove` becomes an object merge, anything else replaces.
    pub fn from_json(document: &Value) -> Result<Self, ExprError> {
        let Value::Object(map) = document else {
            return Err(ExprError::InvalidUpdateDocument {
                message: "expected a JSON object at the top level".to_string(),
            });
        };

        let mut update = Self::new();
        for (attribute, value) in map {
            update.push(attribute.clone(), classify(value));
        }
        Ok(update)
    }
}

impl TryFrom<Value> for UpdateDocument {
    type Error = ExprError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

fn classify(value: &Value) -> UpdateDirective {
    let Value::Object(fields) = value else {
        return UpdateDirective::Replace(value.clone());
    };
    let add = fields.get("add");
    let remove = fields.get("remove");

    if matches!(add, Some(Value::Array(_))) || matches!(remove, Some(Value::Array(_))) {
        return UpdateDirective::ArrayMerge {
            add: array_or_empty(add),
            remove: array_or_empty(remove),
        };
    }
    if let Some(Value::Object(add)) = add {
        return UpdateDirective::ObjectMerge {
            add: Some(add.clone()),
            remove: None,
        };
    }
    if let Some(Value::String(path)) = remove {
        return UpdateDirective::ObjectMerge {
            add: None,
            remove: Some(path.clone()),
        };
    }
    UpdateDirective::Replace(value.clone())
}

fn array_or_empty(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(values)) => values.clone(),
        _ => Vec::new(),
    }
}

pub fn merge_update(previous: &Map<String, Value>, update: &UpdateDocument) -> Map<String, Value> {
    merge_update_at(previous, update, Utc::now())
}

pub fn merge_update_at(
    previous: &Map<String, Value>,
    update: &UpdateDocument,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let mut merged = Map::new();

    for (attribute, directive) in update.directives() {
        match directive {
            UpdateDirective::ArrayMerge { add, remove } => {
                let base = merged.get(attribute).or_else(|| previous.get(attribute));
                let values = merge_set(base, add, remove);
                if values.is_empty() {
                    // Empty sets are left out of the write, not stored as []
                    merged.remove(attribute);
                } else {
                    merged.insert(attribute.clone(), Value::Array(values));
                }
            }
            UpdateDirective::ObjectMerge { add, remove } => {
                let base = merged.get(attribute).or_else(|| previous.get(attribute));
                if add.is_none() && !matches!(base, Some(Value::Object(_))) {
                    // Nothing to remove from; the stored value stays as it is
                    tracing::debug!(
                        attribute = %attribute,
                        "Object remove without an object target, skipping"
                    );
                    continue;
                }
                let mut target = match base {
                    Some(Value::Object(existing)) => existing.clone(),
                    Some(other) if !other.is_null() => {
                        tracing::warn!(
                            attribute = %attribute,
                            "Object merge on a non-object attribute, starting from empty"
                        );
                        Map::new()
                    }
                    _ => Map::new(),
                };
                if let Some(add) = add {
                    deep_merge(&mut target, add);
                }
                if let Some(path) = remove {
                    remove_path(&mut target, path);
                }
                merged.insert(attribute.clone(), Value::Object(target));
            }
            UpdateDirective::Replace(value) => {
                merged.insert(attribute.clone(), value.clone());
            }
        }
    }

    merged.insert(
        UPDATED_AT.to_string(),
        Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    tracing::debug!(
        attributes = update.directives().len(),
        written = merged.len(),
        "Merged update"
    );
    merged
}

/// New `add` elements first, then the existing ones, each kept on first
/// occurrence, minus anything in `remove`.
fn merge_set(base: Option<&Value>, add: &[Value], remove: &[Value]) -> Vec<Value> {
    let existing: &[Value] = match base {
        Some(Value::Array(values)) => values.as_slice(),
        _ => &[],
    };

    let mut result: Vec<Value> = Vec::with_capacity(add.len() + existing.len());
    for value in add.iter().filter(|value| !existing.contains(value)) {
        if !result.contains(value) {
            result.push(value.clone());
        }
    }
    for value in existing {
        if !result.contains(value) {
            result.push(value.clone());
        }
    }
    result.retain(|value| !remove.contains(value));
    result
}

/// Overlay `source` onto `target`; nested objects merge, `source` wins otherwise.
pub fn deep_merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if let Value::Object(incoming) = value {
            if let Some(Value::Object(existing)) = target.get_mut(key) {
                deep_merge(existing, incoming);
                continue;
            }
        }
        target.insert(key.clone(), value.clone());
    }
}

/// Remove a dotted path such as `address.city`. Missing segments are a no-op.
fn remove_path(target: &mut Map<String, Value>, path: &str) {
    let Some((head, rest)) = path.split_once('.') else {
        target.remove(path);
        return;
    };
    if let Some(Value::Object(child)) = target.get_mut(head) {
        remove_path(child, rest);
    }
}
