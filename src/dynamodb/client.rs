use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;

use super::{CompiledQuery, Item, Key, PARTITION_KEY_ATTRIBUTE, send_dynamo_request};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    ThroughputExceeded,
    ResourceNotFound,
    ConditionalCheckFailed,
    TransactionConflict,
    Throttling,
    Validation,
    ServiceUnavailable,
    Other,
}

impl StorageErrorKind {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("ProvisionedThroughputExceededException" | "RequestLimitExceeded") => {
                StorageErrorKind::ThroughputExceeded
            }
            Some("ResourceNotFoundException") => StorageErrorKind::ResourceNotFound,
            Some("ConditionalCheckFailedException") => StorageErrorKind::ConditionalCheckFailed,
            Some("TransactionConflictException") => StorageErrorKind::TransactionConflict,
            Some("ThrottlingException") => StorageErrorKind::Throttling,
            Some("ValidationException") => StorageErrorKind::Validation,
            Some("ServiceUnavailable" | "InternalServerError") => {
                StorageErrorKind::ServiceUnavailable
            }
            _ => StorageErrorKind::Other,
        }
    }
}

/// A failed store call, classified but otherwise passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub code: Option<String>,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{:?} ({}): {}", self.kind, code, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for StorageError {}

impl<E, R> From<SdkError<E, R>> for StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    fn from(err: SdkError<E, R>) -> Self {
        let code = err.code().map(str::to_string);
        let kind = match &err {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
                StorageErrorKind::ServiceUnavailable
            }
            _ => StorageErrorKind::from_code(code.as_deref()),
        };
        Self {
            kind,
            code,
            message: DisplayErrorContext(&err).to_string(),
        }
    }
}

/// Guard expression attached to a put.
#[derive(Debug, Clone, PartialEq)]
pub struct PutCondition {
    pub expression: String,
    pub attribute_names: HashMap<String, String>,
    pub attribute_values: HashMap<String, AttributeValue>,
}

impl PutCondition {
    /// Only write when no item with this key exists yet.
    pub fn item_absent() -> Self {
        Self {
            expression: "attribute_not_exists(#pk)".to_string(),
            attribute_names: HashMap::from([(
                "#pk".to_string(),
                PARTITION_KEY_ATTRIBUTE.to_string(),
            )]),
            attribute_values: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn get(&self, table: &str, key: &Key) -> Result<Option<Item>, StorageError>;

    async fn put(
        &self,
        table: &str,
        item: Item,
        condition: Option<PutCondition>,
    ) -> Result<(), StorageError>;

    async fn delete(&self, table: &str, key: &Key) -> Result<(), StorageError>;

    async fn query(&self, table: &str, query: &CompiledQuery) -> Result<QueryPage, StorageError>;
}

/// [`StorageClient`] backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct DynamoDbClient {
    client: aws_sdk_dynamodb::Client,
    debug_delay: Option<Duration>,
}

impl DynamoDbClient {
    pub fn new(client: aws_sdk_dynamodb::Client) -> Self {
        Self {
            client,
            debug_delay: None,
        }
    }

    pub fn with_debug_delay(mut self, delay: Option<Duration>) -> Self {
        self.debug_delay = delay;
        self
    }

    pub fn inner(&self) -> &aws_sdk_dynamodb::Client {
        &self.client
    }
}

#[async_trait]
impl StorageClient for DynamoDbClient {
    async fn get(&self, table: &str, key: &Key) -> Result<Option<Item>, StorageError> {
        let request = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key.to_item()));
        let span = tracing::trace_span!("GetItem", table = %table, key = %key);
        let output =
            send_dynamo_request(span, self.debug_delay, || request.send(), |err| {
                format!("{err:?}")
            })
            .await?;
        Ok(output.item)
    }

    async fn put(
        &self,
        table: &str,
        item: Item,
        condition: Option<PutCondition>,
    ) -> Result<(), StorageError> {
        let mut request = self.client.put_item().table_name(table).set_item(Some(item));
        let conditional = condition.is_some();
        if let Some(condition) = condition {
            request = request.condition_expression(condition.expression);
            for (key, value) in condition.attribute_names {
                request = request.expression_attribute_names(key, value);
            }
            for (key, value) in condition.attribute_values {
                request = request.expression_attribute_values(key, value);
            }
        }
        let span = tracing::trace_span!("PutItem", table = %table, conditional);
        send_dynamo_request(span, self.debug_delay, || request.send(), |err| {
            format!("{err:?}")
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, table: &str, key: &Key) -> Result<(), StorageError> {
        let request = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(key.to_item()));
        let span = tracing::trace_span!("DeleteItem", table = %table, key = %key);
        send_dynamo_request(span, self.debug_delay, || request.send(), |err| {
            format!("{err:?}")
        })
        .await?;
        Ok(())
    }

    async fn query(&self, table: &str, query: &CompiledQuery) -> Result<QueryPage, StorageError> {
        let request = query.apply_to(self.client.query().table_name(table));

        tracing::trace!(
            table=%table,
            index=?query.index_name(),
            key_condition_expression=%query.key_condition_expression(),
            filter_expression=?query.filter_expression(),
            attribute_names=?query.expression_attribute_names(),
            attribute_values=?query.expression_attribute_values(),
            start_key_present=query.exclusive_start_key().is_some(),
            limit=?query.limit(),
            "Query"
        );

        let span = tracing::trace_span!(
            "Query",
            table = %table,
            start_key_present = query.exclusive_start_key().is_some(),
            limit = ?query.limit()
        );
        let output = send_dynamo_request(span, self.debug_delay, || request.send(), |err| {
            format!("{err:?}")
        })
        .await?;

        Ok(QueryPage {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }
}
