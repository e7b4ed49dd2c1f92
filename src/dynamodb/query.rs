use std::collections::HashMap;

use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::types::AttributeValue;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::expr::{
    ExprError, FilterCondition, LogicalOperator, OperatorKind, PartitionKey, SortOrder, encode,
    encode_key, sanitize, translate,
};

pub const SORT_KEY_FIELD: &str = "sk";
pub const INDEX_RANGE_FIELD: &str = "date";

const SUFFIX_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQueryRequest {
    pub partition_key: PartitionKey,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub page_size: Option<i32>,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub start_key: Option<Map<String, Value>>,
    #[serde(default)]
    pub key_condition_join: LogicalOperator,
    #[serde(default)]
    pub filter_join: LogicalOperator,
}

impl ListQueryRequest {
    pub fn new(partition_key: impl Into<PartitionKey>) -> Self {
        Self {
            partition_key: partition_key.into(),
            filters: Vec::new(),
            sort: SortOrder::default(),
            page_size: None,
            index_name: None,
            start_key: None,
            key_condition_join: LogicalOperator::default(),
            filter_join: LogicalOperator::default(),
        }
    }

    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn start_key(mut self, start_key: Map<String, Value>) -> Self {
        self.start_key = Some(start_key);
        self
    }

    pub fn key_condition_join(mut self, join: LogicalOperator) -> Self {
        self.key_condition_join = join;
        self
    }

    pub fn filter_join(mut self, join: LogicalOperator) -> Self {
        self.filter_join = join;
        self
    }
}

/// Expression half of a compiled query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    pub key_condition_expression: String,
    pub filter_expression: Option<String>,
    pub attribute_names: HashMap<String, String>,
    pub attribute_values: HashMap<String, AttributeValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    expression: CompiledExpression,
    scan_index_forward: bool,
    limit: Option<i32>,
    index_name: Option<String>,
    exclusive_start_key: Option<HashMap<String, AttributeValue>>,
}

impl CompiledQuery {
    pub fn expression(&self) -> &CompiledExpression {
        &self.expression
    }

    pub fn key_condition_expression(&self) -> &str {
        &self.expression.key_condition_expression
    }

    pub fn filter_expression(&self) -> Option<&String> {
        self.expression.filter_expression.as_ref()
    }

    pub fn expression_attribute_names(&self) -> &HashMap<String, String> {
        &self.expression.attribute_names
    }

    pub fn expression_attribute_values(&self) -> &HashMap<String, AttributeValue> {
        &self.expression.attribute_values
    }

    pub fn scan_index_forward(&self) -> bool {
        self.scan_index_forward
    }

    pub fn limit(&self) -> Option<i32> {
        self.limit
    }

    pub fn index_name(&self) -> Option<&String> {
        self.index_name.as_ref()
    }

    pub fn exclusive_start_key(&self) -> Option<&HashMap<String, AttributeValue>> {
        self.exclusive_start_key.as_ref()
    }

    pub fn apply_to(&self, mut request: QueryFluentBuilder) -> QueryFluentBuilder {
        if let Some(index_name) = self.index_name() {
            request = request.index_name(index_name.clone());
        }

        request = request
            .key_condition_expression(self.key_condition_expression())
            .scan_index_forward(self.scan_index_forward);

        if let Some(filter_expr) = self.filter_expression() {
            request = request.filter_expression(filter_expr);
        }

        for (key, value) in self.expression_attribute_names() {
            request = request.expression_attribute_names(key.clone(), value.clone());
        }

        for (key, value) in self.expression_attribute_values() {
            request = request.expression_attribute_values(key.clone(), value.clone());
        }

        if let Some(start_key) = self.exclusive_start_key() {
            request = request.set_exclusive_start_key(Some(start_key.clone()));
        }

        if let Some(limit) = self.limit {
            request = request.limit(limit);
        }

        request
    }
}

/// Compile a list request into key-condition and filter expressions.
pub fn compile_list_query(request: &ListQueryRequest) -> Result<CompiledQuery, ExprError> {
    let mut placeholders = Placeholders::default();
    let mut key_conditions = Vec::new();
    let mut filters = Vec::new();

    let partition_name = request.partition_key.name();
    let name_placeholder = placeholders.name(partition_name)?;
    let value_placeholder =
        placeholders.value(partition_name, encode(request.partition_key.value())?)?;
    key_conditions.push(format!("{} = {}", name_placeholder, value_placeholder));

    for condition in &request.filters {
        let fragment = placeholders.condition(condition)?;
        if is_key_condition_field(&condition.field, request.index_name.is_some()) {
            key_conditions.push(fragment);
        } else {
            filters.push(fragment);
        }
    }

    let key_condition_expression = request.key_condition_join.join(&key_conditions);
    let filter_expression = if filters.is_empty() {
        None
    } else {
        Some(request.filter_join.join(&filters))
    };

    let exclusive_start_key = request.start_key.as_ref().map(encode_key).transpose()?;

    tracing::debug!(
        key_condition_expression = %key_condition_expression,
        filter_expression = ?filter_expression,
        index = ?request.index_name,
        sort = ?request.sort,
        limit = ?request.page_size,
        start_key_present = exclusive_start_key.is_some(),
        "Compiled list query"
    );

    Ok(CompiledQuery {
        expression: CompiledExpression {
            key_condition_expression,
            filter_expression,
            attribute_names: placeholders.names,
            attribute_values: placeholders.values,
        },
        scan_index_forward: !matches!(request.sort, SortOrder::Descending),
        limit: request.page_size,
        index_name: request.index_name.clone(),
        exclusive_start_key,
    })
}

fn is_key_condition_field(field: &str, has_index: bool) -> bool {
    field == SORT_KEY_FIELD || (has_index && field == INDEX_RANGE_FIELD)
}

#[derive(Default)]
struct Placeholders {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl Placeholders {
    fn condition(&mut self, condition: &FilterCondition) -> Result<String, ExprError> {
        let field = &condition.field;
        let key = self.name(field)?;

        if !condition.operator.takes_value() {
            return Ok(translate(condition.operator, &key, "", None));
        }

        let value = self.value(field, encode(&condition.value)?)?;
        let value2 = match condition.operator {
            OperatorKind::Between => {
                let upper = condition
                    .value2
                    .as_ref()
                    .ok_or_else(|| ExprError::MissingUpperBound {
                        field: field.clone(),
                    })?;
                // `:amount` pairs with `:amount2`, whatever suffix `:amount` got
                let base = format!("{}2", &value[1..]);
                Some(self.value(&base, encode(upper)?)?)
            }
            _ => None,
        };

        Ok(translate(
            condition.operator,
            &key,
            &value,
            value2.as_deref(),
        ))
    }

    /// `#field`, shared by every condition on the same field.
    fn name(&mut self, field: &str) -> Result<String, ExprError> {
        let base = placeholder_base(field)?;
        let mut placeholder = format!("#{}", base);
        loop {
            match self.names.get(&placeholder) {
                Some(existing) if existing == field => return Ok(placeholder),
                Some(_) => placeholder = format!("#{}{}", base, random_suffix()),
                None => break,
            }
        }
        self.names.insert(placeholder.clone(), field.to_string());
        Ok(placeholder)
    }

    /// `:field`, suffixed until it does not overwrite an earlier binding.
    fn value(&mut self, field: &str, value: AttributeValue) -> Result<String, ExprError> {
        let base = placeholder_base(field)?;
        let mut placeholder = format!(":{}", base);
        while self.values.contains_key(&placeholder) {
            placeholder = format!(":{}{}", base, random_suffix());
        }
        self.values.insert(placeholder.clone(), value);
        Ok(placeholder)
    }
}

fn placeholder_base(field: &str) -> Result<String, ExprError> {
    let base = sanitize(field);
    if base.is_empty() {
        return Err(ExprError::InvalidFieldName {
            field: field.to_string(),
        });
    }
    Ok(base)
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn s(value: &str) -> AttributeValue {
        AttributeValue::S(value.to_string())
    }

    fn n(value: &str) -> AttributeValue {
        AttributeValue::N(value.to_string())
    }

    #[test]
    fn partition_key_only() {
        let compiled = compile_list_query(&ListQueryRequest::new("user#1")).unwrap();

        assert_eq!(compiled.key_condition_expression(), "#pk = :pk");
        assert_eq!(compiled.filter_expression(), None);
        assert_eq!(compiled.expression_attribute_names().len(), 1);
        assert_eq!(compiled.expression_attribute_names()["#pk"], "pk");
        assert_eq!(compiled.expression_attribute_values().len(), 1);
        assert_eq!(compiled.expression_attribute_values()[":pk"], s("user#1"));
        assert!(compiled.scan_index_forward());
        assert_eq!(compiled.limit(), None);
        assert_eq!(compiled.index_name(), None);
        assert_eq!(compiled.exclusive_start_key(), None);
    }

    #[test]
    fn named_partition_attribute() {
        let request = ListQueryRequest::new(PartitionKey::attribute("tenant-id", "acme"));
        let compiled = compile_list_query(&request).unwrap();

        assert_eq!(compiled.key_condition_expression(), "#tenantid = :tenantid");
        assert_eq!(compiled.expression_attribute_names()["#tenantid"], "tenant-id");
        assert_eq!(compiled.expression_attribute_values()[":tenantid"], s("acme"));
    }

    #[test]
    fn between_filter_and_sort_key_routing() {
        let request = ListQueryRequest::new("user#1")
            .filter(FilterCondition::between("amount", 10, 20))
            .filter(FilterCondition::new(
                "sk",
                OperatorKind::BeginsWith,
                "order#",
            ));
        let compiled = compile_list_query(&request).unwrap();

        assert_eq!(
            compiled.key_condition_expression(),
            "#pk = :pk AND begins_with(#sk, :sk)"
        );
        assert_eq!(
            compiled.filter_expression().map(String::as_str),
            Some("#amount BETWEEN :amount AND :amount2")
        );
        let values = compiled.expression_attribute_values();
        assert_eq!(values[":amount"], n("10"));
        assert_eq!(values[":amount2"], n("20"));
        assert_eq!(values[":sk"], s("order#"));
    }

    #[test]
    fn sort_key_routing_ignores_declaration_order() {
        let sk_first = ListQueryRequest::new("p")
            .filter(FilterCondition::equals("sk", "a"))
            .filter(FilterCondition::equals("status", "open"));
        let sk_last = ListQueryRequest::new("p")
            .filter(FilterCondition::equals("status", "open"))
            .filter(FilterCondition::equals("sk", "a"));

        for request in [sk_first, sk_last] {
            let compiled = compile_list_query(&request).unwrap();
            assert_eq!(compiled.key_condition_expression(), "#pk = :pk AND #sk = :sk");
            assert_eq!(
                compiled.filter_expression().map(String::as_str),
                Some("#status = :status")
            );
        }
    }

    #[test]
    fn date_is_a_key_condition_only_on_an_index() {
        let filter = FilterCondition::new("date", OperatorKind::GreaterOrEqual, "2024-01-01");

        let table = compile_list_query(&ListQueryRequest::new("p").filter(filter.clone())).unwrap();
        assert_eq!(table.key_condition_expression(), "#pk = :pk");
        assert_eq!(
            table.filter_expression().map(String::as_str),
            Some("#date >= :date")
        );

        let index = compile_list_query(
            &ListQueryRequest::new("p")
                .index_name("by-date")
                .filter(filter),
        )
        .unwrap();
        assert_eq!(index.key_condition_expression(), "#pk = :pk AND #date >= :date");
        assert_eq!(index.filter_expression(), None);
        assert_eq!(index.index_name().map(String::as_str), Some("by-date"));
    }

    #[test]
    fn same_field_twice_gets_distinct_value_placeholders() {
        let request = ListQueryRequest::new("p")
            .filter(FilterCondition::new("age", OperatorKind::GreaterThan, 18))
            .filter(FilterCondition::new("age", OperatorKind::LessThan, 65));
        let compiled = compile_list_query(&request).unwrap();

        let values = compiled.expression_attribute_values();
        assert_eq!(values.len(), 3);
        assert_eq!(values[":age"], n("18"));
        let (other, value) = values
            .iter()
            .find(|(key, _)| key.starts_with(":age") && key.as_str() != ":age")
            .expect("suffixed placeholder");
        assert_eq!(value, &n("65"));
        assert_eq!(other.len(), ":age".len() + SUFFIX_LEN);

        let filter = compiled.filter_expression().unwrap();
        assert_eq!(filter, &format!("#age > :age AND #age < {}", other));
        assert_eq!(compiled.expression_attribute_names().len(), 2);
    }

    #[test]
    fn filter_on_pk_does_not_overwrite_partition_value() {
        let request = ListQueryRequest::new("user#1")
            .filter(FilterCondition::new("pk", OperatorKind::NotEqual, "user#2"));
        let compiled = compile_list_query(&request).unwrap();

        let values = compiled.expression_attribute_values();
        assert_eq!(values[":pk"], s("user#1"));
        assert_eq!(values.len(), 2);
        assert!(values.values().any(|value| value == &s("user#2")));
    }

    #[test]
    fn fields_that_sanitize_alike_get_distinct_name_placeholders() {
        let request = ListQueryRequest::new("p")
            .filter(FilterCondition::equals("first-name", "a"))
            .filter(FilterCondition::equals("first_name", "b"));
        let compiled = compile_list_query(&request).unwrap();

        let names = compiled.expression_attribute_names();
        assert_eq!(names.len(), 3);
        assert_eq!(names["#firstname"], "first-name");
        assert!(names.values().any(|field| field == "first_name"));
    }

    #[test]
    fn existence_filters_bind_no_value() {
        let request = ListQueryRequest::new("p")
            .filter(FilterCondition::not_exists("deleted_at"))
            .filter(FilterCondition::exists("email"));
        let compiled = compile_list_query(&request).unwrap();

        assert_eq!(
            compiled.filter_expression().map(String::as_str),
            Some("attribute_not_exists(#deletedat) AND attribute_exists(#email)")
        );
        assert_eq!(compiled.expression_attribute_values().len(), 1);
    }

    #[test]
    fn joins_with_or() {
        let request = ListQueryRequest::new("p")
            .filter(FilterCondition::equals("status", "open"))
            .filter(FilterCondition::new("tags", OperatorKind::Contains, "urgent"))
            .filter_join(LogicalOperator::Or);
        let compiled = compile_list_query(&request).unwrap();

        assert_eq!(
            compiled.filter_expression().map(String::as_str),
            Some("#status = :status OR contains(#tags, :tags)")
        );
    }

    #[test]
    fn descending_sort_reverses_scan() {
        let request = ListQueryRequest::new("p").sort(SortOrder::Descending);
        assert!(!compile_list_query(&request).unwrap().scan_index_forward());

        let request = ListQueryRequest::new("p").sort(SortOrder::Ascending);
        assert!(compile_list_query(&request).unwrap().scan_index_forward());
    }

    #[test]
    fn pagination_is_passed_through() {
        let start_key = json!({"pk": "p", "sk": "item#9"});
        let request = ListQueryRequest::new("p")
            .page_size(25)
            .start_key(start_key.as_object().unwrap().clone());
        let compiled = compile_list_query(&request).unwrap();

        assert_eq!(compiled.limit(), Some(25));
        let cursor = compiled.exclusive_start_key().unwrap();
        assert_eq!(cursor["pk"], s("p"));
        assert_eq!(cursor["sk"], s("item#9"));
    }

    #[test]
    fn between_without_upper_bound_fails() {
        let request = ListQueryRequest::new("p").filter(FilterCondition::new(
            "amount",
            OperatorKind::Between,
            10,
        ));
        assert_eq!(
            compile_list_query(&request),
            Err(ExprError::MissingUpperBound {
                field: "amount".to_string()
            })
        );
    }

    #[test]
    fn object_filter_value_fails() {
        let request = ListQueryRequest::new("p")
            .filter(FilterCondition::equals("meta", json!({"a": 1})));
        assert!(matches!(
            compile_list_query(&request),
            Err(ExprError::UnsupportedValueType { .. })
        ));
    }

    #[test]
    fn unusable_field_name_fails() {
        let request = ListQueryRequest::new("p").filter(FilterCondition::equals("--", 1));
        assert_eq!(
            compile_list_query(&request),
            Err(ExprError::InvalidFieldName {
                field: "--".to_string()
            })
        );
    }

    #[test]
    fn deserializes_json_params() {
        let request: ListQueryRequest = serde_json::from_value(json!({
            "partitionKey": "user#1",
            "filters": [
                {"field": "sk", "value": "order#", "operator": "begins_with"},
                {"field": "total", "value": 100, "operator": "greater_than"}
            ],
            "sort": "DESC",
            "pageSize": 10,
            "keyConditionJoin": "and",
            "filterJoin": "OR"
        }))
        .unwrap();
        let compiled = compile_list_query(&request).unwrap();

        assert_eq!(
            compiled.key_condition_expression(),
            "#pk = :pk AND begins_with(#sk, :sk)"
        );
        assert_eq!(
            compiled.filter_expression().map(String::as_str),
            Some("#total > :total")
        );
        assert!(!compiled.scan_index_forward());
        assert_eq!(compiled.limit(), Some(10));
    }

    #[test]
    fn bad_join_operator_in_params_fails() {
        let result: Result<ListQueryRequest, _> = serde_json::from_value(json!({
            "partitionKey": "p",
            "filterJoin": "NAND"
        }));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Unknown logical operator 'NAND'")
        );
    }
}
