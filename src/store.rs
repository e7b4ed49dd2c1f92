//! CRUD facade over a [`StorageClient`].
//!
//! Every call takes a table name and a params struct, converts between JSON
//! documents and stored items, and hands compiled queries or merged updates
//! to the client. Failures are logged and rethrown with the function name.

use std::fmt;
use std::future::Future;

use chrono::{SecondsFormat, Utc};
use color_eyre::eyre::{Report, Result, WrapErr};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dynamodb::{
    Key, ListQueryRequest, PARTITION_KEY_ATTRIBUTE, PutCondition, SORT_KEY_ATTRIBUTE,
    StorageClient, UPDATED_AT, UpdateDocument, compile_list_query, item_from_json, item_to_json,
    merge_update,
};

pub const CREATED_AT: &str = "created_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    ItemNotFound { table: String, key: Key },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ItemNotFound { table, key } => {
                write!(f, "item {} not found in table {}", key, table)
            }
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetItemParams {
    pub key: Key,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemParams {
    pub key: Key,
    #[serde(default)]
    pub item: Map<String, Value>,
    /// Replace an existing item instead of failing the conditional check.
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemParams {
    pub key: Key,
    pub update: UpdateDocument,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItemParams {
    pub key: Key,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub items: Vec<Map<String, Value>>,
    pub last_key: Option<Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct Store<C> {
    client: C,
}

impl<C: StorageClient> Store<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn get_item(
        &self,
        table: &str,
        params: GetItemParams,
    ) -> Result<Option<Map<String, Value>>> {
        logged("get_item", table, async {
            let item = self.client.get(table, &params.key).await?;
            Ok::<_, Report>(item.as_ref().map(item_to_json).transpose()?)
        })
        .await
    }

    /// Put a new item. Without `overwrite` the write fails with a
    /// conditional-check error if the key is already taken.
    pub async fn create_item(
        &self,
        table: &str,
        params: CreateItemParams,
    ) -> Result<Map<String, Value>> {
        logged("create_item", table, async {
            let mut document = params.item;
            params.key.write_into(&mut document);
            let now = timestamp();
            if !document.contains_key(CREATED_AT) {
                document.insert(CREATED_AT.to_string(), Value::String(now.clone()));
            }
            if !document.contains_key(UPDATED_AT) {
                document.insert(UPDATED_AT.to_string(), Value::String(now));
            }

            let condition = (!params.overwrite).then(PutCondition::item_absent);
            self.client
                .put(table, item_from_json(&document), condition)
                .await?;
            Ok::<_, Report>(document)
        })
        .await
    }

    /// Read the stored item, merge the update into it and write it back.
    /// The read and the write are not atomic: concurrent updates to the same
    /// key race and the last put wins.
    pub async fn update_item(
        &self,
        table: &str,
        params: UpdateItemParams,
    ) -> Result<Map<String, Value>> {
        logged("update_item", table, async {
            let Some(previous) = self.client.get(table, &params.key).await? else {
                return Err(StoreError::ItemNotFound {
                    table: table.to_string(),
                    key: params.key.clone(),
                }
                .into());
            };
            let previous = item_to_json(&previous)?;

            let merged = merge_update(&previous, &params.update);
            if merged.contains_key(PARTITION_KEY_ATTRIBUTE) || merged.contains_key(SORT_KEY_ATTRIBUTE)
            {
                tracing::warn!(
                    table = %table,
                    key = %params.key,
                    "Update touches key attributes, keeping the original key"
                );
            }

            let mut document = previous;
            document.extend(merged);
            params.key.write_into(&mut document);

            self.client
                .put(table, item_from_json(&document), None)
                .await?;
            Ok::<_, Report>(document)
        })
        .await
    }

    pub async fn delete_item(&self, table: &str, params: DeleteItemParams) -> Result<()> {
        logged("delete_item", table, async {
            self.client.delete(table, &params.key).await?;
            Ok::<_, Report>(())
        })
        .await
    }

    /// Run one page of a list query. Items come back exactly as the store
    /// returned them, converted to JSON.
    pub async fn get_list(&self, table: &str, params: ListQueryRequest) -> Result<ListPage> {
        logged("get_list", table, async {
            let query = compile_list_query(&params)?;
            let page = self.client.query(table, &query).await?;

            let mut items = Vec::with_capacity(page.items.len());
            for item in &page.items {
                items.push(item_to_json(item)?);
            }
            let last_key = page
                .last_evaluated_key
                .as_ref()
                .map(item_to_json)
                .transpose()?;
            Ok::<_, Report>(ListPage { items, last_key })
        })
        .await
    }
}

async fn logged<T, F>(function: &'static str, table: &str, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, Report>>,
{
    call.await
        .inspect_err(|err| {
            tracing::error!(function, table = %table, error = %err, "Store call failed");
        })
        .wrap_err_with(|| format!("{function} failed for table {table}"))
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
