//! Query and update building for DynamoDB tables keyed by `pk`/`sk`.
//!
//! [`dynamodb::compile_list_query`] turns a [`dynamodb::ListQueryRequest`]
//! into key-condition and filter expressions with their placeholder maps, and
//! [`dynamodb::merge_update`] folds a partial [`dynamodb::UpdateDocument`]
//! into the item it was read from. Both are pure; [`store::Store`] sequences
//! them around a [`dynamodb::StorageClient`].

pub mod aws;
pub mod dynamodb;
pub mod expr;
pub mod logging;
pub mod store;

pub use aws::{StoreConfig, connect};
pub use store::Store;
