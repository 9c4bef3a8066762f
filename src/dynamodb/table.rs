//! Wrapper client for one DynamoDB table.
//!
//! The wrapper owns an explicitly constructed SDK client, translates SDK
//! errors into [`TableError`], and exposes single-page pagination for query
//! and scan. It is meant for non-concurrent use: clone it (cheaply) instead
//! of sharing one instance across tasks that interleave key-schema lookups.

use crate::common::error::{CommonError, classify, render_sdk_error};
use crate::dynamodb::update_expression::{
    PARTITION_KEY_ATTRIBUTE, SORT_KEY_ATTRIBUTE, UpdateExpression,
};

use aws_sdk_dynamodb::operation::{
    put_item::PutItemOutput, transact_write_items::TransactWriteItemsError,
    transact_write_items::TransactWriteItemsOutput, update_item::UpdateItemOutput,
};
use aws_sdk_dynamodb::{Client, error, error::ProvideErrorMetadata, types};
use serde::Serialize;
use serde_dynamo::to_item;
use std::{collections, sync};
use thiserror::Error;

/// The validation message DynamoDB returns when a query names a non-key
/// attribute in its key condition.
const MISSED_KEY_SCHEMA_MESSAGE: &str = "Query condition missed key schema element";

/// Errors raised by the table wrapper.
#[derive(Debug, Error)]
pub enum TableError {
    /// The table does not exist (or is not visible to the credentials).
    #[error("table `{0}` does not exist")]
    TableDoesNotExist(String),
    /// The table already exists.
    #[error("table `{0}` already exists")]
    TableAlreadyExists(String),
    /// An item with the same primary key already exists and overwriting was
    /// not requested.
    #[error("an item with the same primary key already exists")]
    PrimaryKeyConstraint,
    /// The condition guarding an update was not met.
    #[error("the condition guarding the update was not met")]
    ConditionFailed,
    /// A query named an attribute that is not part of the key schema.
    #[error("attribute `{0}` is not part of the key schema")]
    PartitionKeyNameInvalid(String),
    /// The described key schema carries no hash key.
    #[error("table `{0}` describes a key schema without a hash key")]
    MalformedKeySchema(String),
    /// The store rejected a request parameter.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A multi-item transaction was canceled by the store.
    #[error("transaction canceled: {0}")]
    TransactionCanceled(String),
    /// Authentication or connection failure.
    #[error(transparent)]
    Common(#[from] CommonError),
    /// An item could not be serialized to DynamoDB attribute values.
    #[error(transparent)]
    Serialization(#[from] serde_dynamo::Error),
    /// A request component could not be built.
    #[error(transparent)]
    Build(#[from] error::BuildError),
    /// Any other SDK failure, rendered with its full error chain.
    #[error("unexpected SDK error: {0}")]
    Sdk(String),
}

/// The attribute names forming a table's primary key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyAttributeNames {
    /// The hash (partition) key attribute name.
    pub hash: String,
    /// The range (sort) key attribute name, for composite keys.
    pub range: Option<String>,
}

/// Arguments for single-page read operations (query, scan).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageArgs {
    /// The maximum number of items to evaluate for this page.
    pub limit: Option<i32>,
    /// Where to resume, from the previous page's `last_evaluated_key`.
    pub exclusive_start_key: Option<collections::HashMap<String, types::AttributeValue>>,
}

/// One page of items plus the cursor for the next page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    /// The items of this page.
    pub items: Vec<collections::HashMap<String, types::AttributeValue>>,
    /// The cursor to pass as the next page's `exclusive_start_key`; `None`
    /// when the read is exhausted.
    pub last_evaluated_key: Option<collections::HashMap<String, types::AttributeValue>>,
}

/// Wrapper client for one DynamoDB table.
///
/// ```rust,no_run
/// use aws_clients::dynamodb::table;
/// use aws_sdk_dynamodb::Client;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), table::TableError> {
/// # let client = Client::from_conf(aws_sdk_dynamodb::config::Config::builder().build());
/// let table = table::Table::new(client, "botte-be-task-prod");
/// table
///     .put_item(
///         json!({
///             "PK": "BOTTE_MESSAGE",
///             "SK": "2XxEn9LlUFuTyn0tOCySn11smMS",
///             "SenderService": "DYNAMODB_CLIENT_TEST",
///         }),
///         false,
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Table {
    client: Client,
    name: String,
    key_names: sync::OnceLock<KeyAttributeNames>,
}

impl Table {
    /// Wrap `client` for operations against the table called `name`.
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            key_names: sync::OnceLock::new(),
        }
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute names of the table's primary key, fetched once per
    /// instance and memoized.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.dynamodb.key_attribute_names", skip_all, err)
    )]
    pub async fn key_attribute_names(&self) -> Result<KeyAttributeNames, TableError> {
        if let Some(names) = self.key_names.get() {
            return Ok(names.clone());
        }
        let output = self
            .client
            .describe_table()
            .table_name(&self.name)
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                let service_error = err.into_service_error();
                if service_error.is_resource_not_found_exception() {
                    TableError::TableDoesNotExist(self.name.clone())
                } else {
                    TableError::Sdk(render_sdk_error(&service_error))
                }
            })?;
        let elements = output
            .table
            .and_then(|table| table.key_schema)
            .unwrap_or_default();
        let names = extract_key_attribute_names(&self.name, elements)?;
        Ok(self.key_names.get_or_init(|| names).clone())
    }

    /// Write (put) an item to the table.
    ///
    /// Unless `overwrite_existing` is set, the write is guarded with an
    /// `attribute_not_exists` condition on the hash key (the hash key alone
    /// is enough to detect a duplicate item) and fails with
    /// [`TableError::PrimaryKeyConstraint`] when the item already exists.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.dynamodb.put_item", skip_all, err)
    )]
    pub async fn put_item<T: Serialize>(
        &self,
        item: T,
        overwrite_existing: bool,
    ) -> Result<PutItemOutput, TableError> {
        let item: collections::HashMap<String, types::AttributeValue> = to_item(item)?;
        let mut builder = self
            .client
            .put_item()
            .table_name(&self.name)
            .set_item(Some(item));
        if !overwrite_existing {
            let key_names = self.key_attribute_names().await?;
            builder =
                builder.condition_expression(format!("attribute_not_exists({})", key_names.hash));
        }
        builder.send().await.map_err(|err| {
            if let Some(common) = classify(&err) {
                return common.into();
            }
            let service_error = err.into_service_error();
            if service_error.is_resource_not_found_exception() {
                TableError::TableDoesNotExist(self.name.clone())
            } else if service_error.is_conditional_check_failed_exception() {
                TableError::PrimaryKeyConstraint
            } else if service_error.code() == Some("ValidationException") {
                TableError::InvalidRequest(service_error.message().unwrap_or_default().to_string())
            } else {
                TableError::Sdk(render_sdk_error(&service_error))
            }
        })
    }

    /// Read one page of items sharing a partition key value. A cheap query
    /// operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.dynamodb.query_by_partition_key", skip_all, err)
    )]
    pub async fn query_by_partition_key(
        &self,
        partition_key_name: &str,
        partition_key_value: &str,
        page_args: PageArgs,
    ) -> Result<Page, TableError> {
        let output = self
            .client
            .query()
            .table_name(&self.name)
            .key_condition_expression("#pk = :pk")
            .expression_attribute_names("#pk", partition_key_name)
            .expression_attribute_values(
                ":pk",
                types::AttributeValue::S(partition_key_value.to_string()),
            )
            .set_limit(page_args.limit)
            .set_exclusive_start_key(page_args.exclusive_start_key)
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                let service_error = err.into_service_error();
                let message = service_error.message().unwrap_or_default();
                if message.contains(MISSED_KEY_SCHEMA_MESSAGE) {
                    TableError::PartitionKeyNameInvalid(partition_key_name.to_string())
                } else if service_error.is_resource_not_found_exception() {
                    TableError::TableDoesNotExist(self.name.clone())
                } else {
                    TableError::Sdk(render_sdk_error(&service_error))
                }
            })?;
        Ok(Page {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
        })
    }

    /// Read one page of the whole table. An expensive scan operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.dynamodb.scan", skip_all, err)
    )]
    pub async fn scan(&self, page_args: PageArgs) -> Result<Page, TableError> {
        let output = self
            .client
            .scan()
            .table_name(&self.name)
            .set_limit(page_args.limit)
            .set_exclusive_start_key(page_args.exclusive_start_key)
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                let service_error = err.into_service_error();
                if service_error.is_resource_not_found_exception() {
                    TableError::TableDoesNotExist(self.name.clone())
                } else {
                    TableError::Sdk(render_sdk_error(&service_error))
                }
            })?;
        Ok(Page {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
        })
    }

    /// Issue a compiled standalone update expression against the table.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.dynamodb.update_item", skip_all, err)
    )]
    pub async fn update_item(
        &self,
        expression: UpdateExpression,
    ) -> Result<UpdateItemOutput, TableError> {
        self.client
            .update_item()
            .table_name(&self.name)
            .set_key(Some(expression.key))
            .update_expression(expression.update_expression)
            .set_expression_attribute_names(Some(expression.expression_attribute_names))
            .set_expression_attribute_values(Some(expression.expression_attribute_values))
            .return_values(expression.return_values)
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                let service_error = err.into_service_error();
                if service_error.is_resource_not_found_exception() {
                    TableError::TableDoesNotExist(self.name.clone())
                } else if service_error.is_conditional_check_failed_exception() {
                    TableError::ConditionFailed
                } else {
                    TableError::Sdk(render_sdk_error(&service_error))
                }
            })
    }

    /// Commit several compiled transactional envelopes atomically.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "aws_clients.dynamodb.transact_write", skip_all, err)
    )]
    pub async fn transact_write(
        &self,
        items: Vec<types::TransactWriteItem>,
    ) -> Result<TransactWriteItemsOutput, TableError> {
        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|err| {
                if let Some(common) = classify(&err) {
                    return common.into();
                }
                match err.into_service_error() {
                    TransactWriteItemsError::TransactionCanceledException(canceled) => {
                        let reasons = canceled
                            .cancellation_reasons
                            .unwrap_or_default()
                            .into_iter()
                            .filter_map(|reason| reason.code)
                            .collect::<Vec<_>>()
                            .join(", ");
                        TableError::TransactionCanceled(reasons)
                    }
                    service_error if service_error.is_resource_not_found_exception() => {
                        TableError::TableDoesNotExist(self.name.clone())
                    }
                    service_error => TableError::Sdk(render_sdk_error(&service_error)),
                }
            })
    }
}

/// Create a table with the standard string `PK`/`SK` composite key and
/// pay-per-request billing. Typically used by integration fixtures; real
/// tables are provisioned by infrastructure tooling.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(name = "aws_clients.dynamodb.create_table", skip_all, err)
)]
pub async fn create_table(
    client: &Client,
    name: &str,
    tags: &[(&str, &str)],
) -> Result<(), TableError> {
    let mut builder = client
        .create_table()
        .table_name(name)
        .attribute_definitions(string_attribute_definition(PARTITION_KEY_ATTRIBUTE)?)
        .attribute_definitions(string_attribute_definition(SORT_KEY_ATTRIBUTE)?)
        .key_schema(key_schema_element(
            PARTITION_KEY_ATTRIBUTE,
            types::KeyType::Hash,
        )?)
        .key_schema(key_schema_element(
            SORT_KEY_ATTRIBUTE,
            types::KeyType::Range,
        )?)
        .billing_mode(types::BillingMode::PayPerRequest);
    for (key, value) in tags {
        builder = builder.tags(types::Tag::builder().key(*key).value(*value).build()?);
    }
    builder
        .send()
        .await
        .map(|_| ())
        .map_err(|err| {
            if let Some(common) = classify(&err) {
                return common.into();
            }
            let service_error = err.into_service_error();
            if service_error.is_resource_in_use_exception() {
                TableError::TableAlreadyExists(name.to_string())
            } else {
                TableError::Sdk(render_sdk_error(&service_error))
            }
        })
}

fn string_attribute_definition(name: &str) -> Result<types::AttributeDefinition, TableError> {
    let definition = types::AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(types::ScalarAttributeType::S)
        .build()?;
    Ok(definition)
}

fn key_schema_element(
    name: &str,
    key_type: types::KeyType,
) -> Result<types::KeySchemaElement, TableError> {
    let element = types::KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()?;
    Ok(element)
}

fn extract_key_attribute_names(
    table_name: &str,
    elements: Vec<types::KeySchemaElement>,
) -> Result<KeyAttributeNames, TableError> {
    let mut hash = None;
    let mut range = None;
    for element in elements {
        if element.key_type == types::KeyType::Hash {
            hash = Some(element.attribute_name);
        } else if element.key_type == types::KeyType::Range {
            range = Some(element.attribute_name);
        }
    }
    let hash = hash.ok_or_else(|| TableError::MalformedKeySchema(table_name.to_string()))?;
    Ok(KeyAttributeNames { hash, range })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_key_attribute_names_composite() {
        let elements = vec![
            key_schema_element("TaskId", types::KeyType::Hash).unwrap(),
            key_schema_element("Text", types::KeyType::Range).unwrap(),
        ];
        let names = extract_key_attribute_names("tasks", elements).unwrap();
        assert_eq!(
            names,
            KeyAttributeNames {
                hash: "TaskId".to_string(),
                range: Some("Text".to_string()),
            },
        );
    }

    #[test]
    fn test_extract_key_attribute_names_hash_only() {
        let elements = vec![key_schema_element("TaskId", types::KeyType::Hash).unwrap()];
        let names = extract_key_attribute_names("tasks", elements).unwrap();
        assert_eq!(
            names,
            KeyAttributeNames {
                hash: "TaskId".to_string(),
                range: None,
            },
        );
    }

    #[test]
    fn test_extract_key_attribute_names_without_hash_key_fails() {
        let elements = vec![key_schema_element("Text", types::KeyType::Range).unwrap()];
        let err = extract_key_attribute_names("tasks", elements).unwrap_err();
        assert!(matches!(err, TableError::MalformedKeySchema(name) if name == "tasks"));
    }
}
