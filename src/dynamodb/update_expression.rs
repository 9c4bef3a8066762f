//! Compile a set of pending attribute writes into one conditional
//! `UpdateExpression`.
//!
//! The store supports two write semantics per attribute: create-if-absent
//! (`if_not_exists`) and unconditional overwrite. A factory accumulates both
//! kinds of pending writes, plus the secondary-index attributes bound to
//! them, and compiles everything into a single `SET` clause with the
//! placeholder maps the store expects. The result is either a standalone
//! expression for `UpdateItem` or a [`aws_sdk_dynamodb::types::TransactWriteItem`]
//! envelope for `TransactWriteItems`.

use crate::common::naming;

use aws_sdk_dynamodb::{error, types};
use indexmap::IndexMap;
use serde::Serialize;
use serde_dynamo::to_attribute_value;
use std::collections;
use thiserror::Error;

/// Attribute name addressing the item's partition key.
pub const PARTITION_KEY_ATTRIBUTE: &str = "PK";

/// Attribute name addressing the item's sort key.
pub const SORT_KEY_ATTRIBUTE: &str = "SK";

/// Errors raised while registering or compiling attribute writes.
///
/// These are programmer/input errors detected synchronously: they are fatal
/// to the call and never worth retrying.
#[derive(Debug, Error)]
pub enum UpdateExpressionError {
    /// An index-bound attribute was registered with a null value. A null can
    /// never be assigned to an indexed attribute: it would invalidate the
    /// index entry and has no defined secondary-index behavior.
    #[error("index attribute `{0}` cannot be bound to a null value")]
    NullIndexValue(String),
    /// Compilation was attempted with zero registered attributes.
    #[error("at least one attribute must be registered before compiling")]
    NoAttributes,
    /// Transaction mode requires the target table name.
    #[error("`table_name` is required when compiling as a transaction")]
    MissingTableName,
    /// A table name only belongs in the transactional envelope.
    #[error("`table_name` must only be provided when compiling as a transaction")]
    UnexpectedTableName,
    /// The store does not support return values inside transactions.
    #[error("return values are not supported when compiling as a transaction")]
    ReturnValuesInTransaction,
    /// The same attribute was registered with different values under
    /// create-only and overwrite semantics.
    #[error(
        "conflicting values registered for attribute `{name}`: create-only {create_only:?}, overwrite {overwrite:?}"
    )]
    AttributeConflict {
        /// The attribute registered twice.
        name: String,
        /// The value registered with create-only semantics.
        create_only: types::AttributeValue,
        /// The value registered with overwrite semantics.
        overwrite: types::AttributeValue,
    },
    /// A value could not be serialized to a DynamoDB attribute value.
    #[error(transparent)]
    Serialization(#[from] serde_dynamo::Error),
    /// The transactional envelope could not be built.
    #[error(transparent)]
    Build(#[from] error::BuildError),
}

/// Write semantics for one pending attribute.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WriteMode {
    /// Write only when the item (or the attribute) is absent.
    #[default]
    CreateOnly,
    /// Overwrite any existing value unconditionally.
    Overwrite,
}

/// One pending attribute registration.
///
/// Secondary-index attributes can be bound alongside the attribute they
/// mirror, or registered on their own as regular attributes:
///
/// ```rust
/// use aws_clients::dynamodb::update_expression::AttributeWrite;
/// use indexmap::IndexMap;
///
/// let bound = AttributeWrite {
///     name: "region".to_string(),
///     value: "sg-one-north",
///     index_bindings: IndexMap::from([
///         ("gsi_session_pk_region".to_string(), "sg-one-north"),
///     ]),
///     ..Default::default()
/// };
/// let standalone = AttributeWrite {
///     name: "gsi_session_pk_region".to_string(),
///     value: "sg-one-north",
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeWrite<T> {
    /// The name of the attribute to write.
    pub name: String,
    /// The value to write.
    pub value: T,
    /// Secondary-index attributes mirroring this write, by name. Values must
    /// not be null.
    pub index_bindings: IndexMap<String, T>,
    /// Create-only or overwrite semantics. Defaults to create-only.
    pub mode: WriteMode,
}

/// Arguments for [`UpdateExpressionFactory::compile`].
///
/// `as_transaction` and `table_name` must agree: the table name is required
/// in transaction mode and rejected otherwise.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompileArgs {
    /// Compile into a transactional envelope instead of a standalone
    /// expression.
    pub as_transaction: bool,
    /// The target table, only in transaction mode.
    pub table_name: Option<String>,
    /// Which item attributes to return. Defaults to none; must stay at the
    /// default in transaction mode.
    pub return_values: Option<types::ReturnValue>,
}

/// A compiled standalone update expression, ready for an `UpdateItem` call.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateExpression {
    /// The full key of the target item.
    pub key: collections::HashMap<String, types::AttributeValue>,
    /// The combined `SET ...` clause.
    pub update_expression: String,
    /// Placeholder (`#name`) to real attribute name.
    pub expression_attribute_names: collections::HashMap<String, String>,
    /// Placeholder (`:name`) to attribute value.
    pub expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
    /// Which item attributes to return.
    pub return_values: types::ReturnValue,
}

/// The result of compiling the accumulated writes.
#[derive(Clone, Debug, PartialEq)]
pub enum CompiledExpression {
    /// A standalone expression for an `UpdateItem` call.
    Standalone(UpdateExpression),
    /// An envelope for inclusion in a `TransactWriteItems` call.
    Transaction(types::TransactWriteItem),
}

impl CompiledExpression {
    /// Return the standalone expression, if compiled without a transaction.
    pub fn into_standalone(self) -> Option<UpdateExpression> {
        match self {
            Self::Standalone(expression) => Some(expression),
            Self::Transaction(_) => None,
        }
    }

    /// Return the transactional envelope, if compiled as a transaction.
    pub fn into_transact_item(self) -> Option<types::TransactWriteItem> {
        match self {
            Self::Standalone(_) => None,
            Self::Transaction(item) => Some(item),
        }
    }
}

/// One `SET` fragment with its placeholder registrations.
#[derive(Debug, Default)]
struct Fragment {
    expression: String,
    expression_attribute_names: collections::HashMap<String, String>,
    expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl Fragment {
    fn set(name: &str, value: types::AttributeValue) -> Self {
        let expression = format!("#{name} = :{name}");
        Self::with_placeholders(name, value, expression)
    }

    fn set_if_not_exists(name: &str, value: types::AttributeValue) -> Self {
        let expression = format!("#{name} = if_not_exists(#{name}, :{name})");
        Self::with_placeholders(name, value, expression)
    }

    fn with_placeholders(name: &str, value: types::AttributeValue, expression: String) -> Self {
        let expression_attribute_names =
            collections::HashMap::from([(format!("#{name}"), naming::to_attribute_name(name))]);
        let expression_attribute_values = collections::HashMap::from([(format!(":{name}"), value)]);
        Self {
            expression,
            expression_attribute_names,
            expression_attribute_values,
        }
    }

    fn merge(operator: &str, items: Vec<Self>) -> Self {
        let mut merged = Self::default();
        for item in items {
            merged
                .expression_attribute_names
                .extend(item.expression_attribute_names);
            merged
                .expression_attribute_values
                .extend(item.expression_attribute_values);
            merged.expression = if merged.expression.is_empty() {
                item.expression
            } else {
                format!("{}{}{}", merged.expression, operator, item.expression)
            };
        }
        merged
    }
}

/// Accumulates pending attribute writes for one item and compiles them into
/// a single conditional update statement.
///
/// A factory is constructed fresh per logical update, filled through
/// [`add`](Self::add), compiled once, then discarded. It must not be shared
/// across concurrent update operations.
///
/// ```rust
/// use aws_clients::dynamodb::update_expression::{
///     AttributeWrite, CompileArgs, UpdateExpressionFactory, WriteMode,
/// };
///
/// # fn main() -> Result<(), aws_clients::dynamodb::update_expression::UpdateExpressionError> {
/// let mut factory = UpdateExpressionFactory::new("pk1", "sk1");
/// factory.add(AttributeWrite {
///     name: "drivelog".to_string(),
///     value: "2022.06.23.16.51.09_g2h-veh-8006",
///     mode: WriteMode::Overwrite,
///     ..Default::default()
/// })?;
/// let transact_item = factory
///     .compile(CompileArgs {
///         as_transaction: true,
///         table_name: Some("MyTable".to_string()),
///         ..Default::default()
///     })?
///     .into_transact_item();
/// # let _ = transact_item;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateExpressionFactory {
    partition_key: String,
    sort_key: String,
    create_only: IndexMap<String, types::AttributeValue>,
    overwrite: IndexMap<String, types::AttributeValue>,
    create_only_indexes: IndexMap<String, types::AttributeValue>,
    overwrite_indexes: IndexMap<String, types::AttributeValue>,
}

impl UpdateExpressionFactory {
    /// Create a factory for the item addressed by `partition_key` and
    /// `sort_key`.
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
            ..Default::default()
        }
    }

    /// Register one pending attribute write, with any bound secondary-index
    /// attributes under the same write mode.
    ///
    /// Registering the same name again under the same mode replaces the
    /// pending value. Values are serialized immediately; a null index-binding
    /// value fails with [`UpdateExpressionError::NullIndexValue`].
    pub fn add<T: Serialize>(
        &mut self,
        write: AttributeWrite<T>,
    ) -> Result<(), UpdateExpressionError> {
        let value: types::AttributeValue = to_attribute_value(write.value)?;
        let mut bindings = IndexMap::with_capacity(write.index_bindings.len());
        for (index_name, index_value) in write.index_bindings {
            let index_value: types::AttributeValue = to_attribute_value(index_value)?;
            if matches!(index_value, types::AttributeValue::Null(_)) {
                return Err(UpdateExpressionError::NullIndexValue(index_name));
            }
            bindings.insert(index_name, index_value);
        }
        let (attributes, indexes) = match write.mode {
            WriteMode::CreateOnly => (&mut self.create_only, &mut self.create_only_indexes),
            WriteMode::Overwrite => (&mut self.overwrite, &mut self.overwrite_indexes),
        };
        attributes.insert(write.name, value);
        indexes.extend(bindings);
        Ok(())
    }

    /// Compile the accumulated writes into a [`CompiledExpression`].
    ///
    /// Create-only entries whose name also carries an overwrite entry are
    /// dropped when the two values are equal (the unconditional write covers
    /// them) and rejected with
    /// [`UpdateExpressionError::AttributeConflict`] when they differ.
    ///
    /// Compiling is a pure function of the accumulated state: the factory is
    /// not mutated and a second call yields the same result.
    pub fn compile(&self, args: CompileArgs) -> Result<CompiledExpression, UpdateExpressionError> {
        if self.create_only.is_empty()
            && self.overwrite.is_empty()
            && self.create_only_indexes.is_empty()
            && self.overwrite_indexes.is_empty()
        {
            return Err(UpdateExpressionError::NoAttributes);
        }
        if args.as_transaction && args.table_name.is_none() {
            return Err(UpdateExpressionError::MissingTableName);
        }
        if !args.as_transaction && args.table_name.is_some() {
            return Err(UpdateExpressionError::UnexpectedTableName);
        }
        let return_values = args.return_values.unwrap_or(types::ReturnValue::None);
        if args.as_transaction && return_values != types::ReturnValue::None {
            return Err(UpdateExpressionError::ReturnValuesInTransaction);
        }

        let mut fragments = Vec::new();
        Self::collect_fragments(&self.create_only, &self.overwrite, &mut fragments)?;
        Self::collect_fragments(
            &self.create_only_indexes,
            &self.overwrite_indexes,
            &mut fragments,
        )?;
        let merged = Fragment::merge(", ", fragments);
        let update_expression = format!("SET {}", merged.expression);
        let key = collections::HashMap::from([
            (
                PARTITION_KEY_ATTRIBUTE.to_string(),
                types::AttributeValue::S(self.partition_key.clone()),
            ),
            (
                SORT_KEY_ATTRIBUTE.to_string(),
                types::AttributeValue::S(self.sort_key.clone()),
            ),
        ]);

        if let Some(table_name) = args.table_name {
            let update = types::Update::builder()
                .table_name(table_name)
                .set_key(Some(key))
                .update_expression(update_expression)
                .set_expression_attribute_names(Some(merged.expression_attribute_names))
                .set_expression_attribute_values(Some(merged.expression_attribute_values))
                .return_values_on_condition_check_failure(
                    types::ReturnValuesOnConditionCheckFailure::None,
                )
                .build()?;
            let item = types::TransactWriteItem::builder().update(update).build();
            Ok(CompiledExpression::Transaction(item))
        } else {
            Ok(CompiledExpression::Standalone(UpdateExpression {
                key,
                update_expression,
                expression_attribute_names: merged.expression_attribute_names,
                expression_attribute_values: merged.expression_attribute_values,
                return_values,
            }))
        }
    }

    /// Emit the fragments for one create-only/overwrite bucket pair,
    /// reconciling names registered under both semantics.
    fn collect_fragments(
        create_only: &IndexMap<String, types::AttributeValue>,
        overwrite: &IndexMap<String, types::AttributeValue>,
        fragments: &mut Vec<Fragment>,
    ) -> Result<(), UpdateExpressionError> {
        for (name, value) in create_only {
            if let Some(existing) = overwrite.get(name) {
                if existing != value {
                    return Err(UpdateExpressionError::AttributeConflict {
                        name: name.clone(),
                        create_only: value.clone(),
                        overwrite: existing.clone(),
                    });
                }
                // Equal values: the unconditional write below covers it.
                continue;
            }
            fragments.push(Fragment::set_if_not_exists(name, value.clone()));
        }
        for (name, value) in overwrite {
            fragments.push(Fragment::set(name, value.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use serde_json::{Value, json};

    fn factory_with(writes: Vec<AttributeWrite<Value>>) -> UpdateExpressionFactory {
        let mut factory = UpdateExpressionFactory::new("pk1", "sk1");
        for write in writes {
            factory.add(write).unwrap();
        }
        factory
    }

    #[test]
    fn test_create_only_with_bound_index() {
        let factory = factory_with(vec![AttributeWrite {
            name: "region".to_string(),
            value: json!("sg-one-north"),
            index_bindings: IndexMap::from([(
                "gsi_session_pk_region".to_string(),
                json!("sg-one-north"),
            )]),
            ..Default::default()
        }]);
        let expression = factory
            .compile(CompileArgs::default())
            .unwrap()
            .into_standalone()
            .unwrap();
        assert_eq!(
            expression.update_expression,
            "SET #region = if_not_exists(#region, :region), \
             #gsi_session_pk_region = if_not_exists(#gsi_session_pk_region, :gsi_session_pk_region)",
        );
        assert_eq!(
            expression.expression_attribute_names,
            collections::HashMap::from([
                ("#region".to_string(), "Region".to_string()),
                (
                    "#gsi_session_pk_region".to_string(),
                    "GSISessionPKRegion".to_string()
                ),
            ]),
        );
        assert_eq!(
            expression.expression_attribute_values,
            collections::HashMap::from([
                (
                    ":region".to_string(),
                    types::AttributeValue::S("sg-one-north".to_string())
                ),
                (
                    ":gsi_session_pk_region".to_string(),
                    types::AttributeValue::S("sg-one-north".to_string())
                ),
            ]),
        );
        assert_eq!(
            expression.key,
            collections::HashMap::from([
                (
                    "PK".to_string(),
                    types::AttributeValue::S("pk1".to_string())
                ),
                (
                    "SK".to_string(),
                    types::AttributeValue::S("sk1".to_string())
                ),
            ]),
        );
        assert_eq!(expression.return_values, types::ReturnValue::None);
    }

    #[test]
    fn test_transaction_envelope() {
        let factory = factory_with(vec![AttributeWrite {
            name: "drivelog".to_string(),
            value: json!("2022.06.23.16.51.09_g2h-veh-8006"),
            mode: WriteMode::Overwrite,
            ..Default::default()
        }]);
        let item = factory
            .compile(CompileArgs {
                as_transaction: true,
                table_name: Some("MyTable".to_string()),
                ..Default::default()
            })
            .unwrap()
            .into_transact_item()
            .unwrap();
        let update = item.update().unwrap();
        assert_eq!(update.table_name(), "MyTable");
        assert_eq!(update.update_expression(), "SET #drivelog = :drivelog");
        assert_eq!(
            update.key(),
            &collections::HashMap::from([
                (
                    "PK".to_string(),
                    types::AttributeValue::S("pk1".to_string())
                ),
                (
                    "SK".to_string(),
                    types::AttributeValue::S("sk1".to_string())
                ),
            ]),
        );
        assert_eq!(
            update.expression_attribute_values(),
            Some(&collections::HashMap::from([(
                ":drivelog".to_string(),
                types::AttributeValue::S("2022.06.23.16.51.09_g2h-veh-8006".to_string()),
            )])),
        );
        assert_eq!(
            update.return_values_on_condition_check_failure(),
            Some(&types::ReturnValuesOnConditionCheckFailure::None),
        );
    }

    #[test]
    fn test_clause_orders_create_only_before_overwrite_and_plain_before_indexed() {
        let factory = factory_with(vec![
            AttributeWrite {
                name: "region".to_string(),
                value: json!("sg-one-north"),
                index_bindings: IndexMap::from([(
                    "gsi_session_pk_region".to_string(),
                    json!("sg-one-north"),
                )]),
                ..Default::default()
            },
            AttributeWrite {
                name: "drivelog".to_string(),
                value: json!("log-1"),
                mode: WriteMode::Overwrite,
                ..Default::default()
            },
        ]);
        let expression = factory
            .compile(CompileArgs::default())
            .unwrap()
            .into_standalone()
            .unwrap();
        assert_eq!(
            expression.update_expression,
            "SET #region = if_not_exists(#region, :region), \
             #drivelog = :drivelog, \
             #gsi_session_pk_region = if_not_exists(#gsi_session_pk_region, :gsi_session_pk_region)",
        );
    }

    #[test]
    fn test_equal_duplicate_collapses_to_overwrite_form() {
        let factory = factory_with(vec![
            AttributeWrite {
                name: "region".to_string(),
                value: json!("sg-one-north"),
                ..Default::default()
            },
            AttributeWrite {
                name: "region".to_string(),
                value: json!("sg-one-north"),
                mode: WriteMode::Overwrite,
                ..Default::default()
            },
        ]);
        let expression = factory
            .compile(CompileArgs::default())
            .unwrap()
            .into_standalone()
            .unwrap();
        assert_eq!(expression.update_expression, "SET #region = :region");
    }

    #[test]
    fn test_conflicting_duplicate_fails() {
        let factory = factory_with(vec![
            AttributeWrite {
                name: "region".to_string(),
                value: json!("sg-one-north"),
                ..Default::default()
            },
            AttributeWrite {
                name: "region".to_string(),
                value: json!("us-east-1"),
                mode: WriteMode::Overwrite,
                ..Default::default()
            },
        ]);
        let err = factory.compile(CompileArgs::default()).unwrap_err();
        assert!(matches!(
            err,
            UpdateExpressionError::AttributeConflict { name, .. } if name == "region",
        ));
    }

    #[test]
    fn test_conflicting_index_duplicate_fails() {
        let factory = factory_with(vec![
            AttributeWrite {
                name: "region".to_string(),
                value: json!("sg-one-north"),
                index_bindings: IndexMap::from([(
                    "gsi_session_pk_region".to_string(),
                    json!("sg-one-north"),
                )]),
                ..Default::default()
            },
            AttributeWrite {
                name: "region".to_string(),
                value: json!("sg-one-north"),
                index_bindings: IndexMap::from([(
                    "gsi_session_pk_region".to_string(),
                    json!("us-east-1"),
                )]),
                mode: WriteMode::Overwrite,
                ..Default::default()
            },
        ]);
        let err = factory.compile(CompileArgs::default()).unwrap_err();
        assert!(matches!(
            err,
            UpdateExpressionError::AttributeConflict { name, .. } if name == "gsi_session_pk_region",
        ));
    }

    #[test]
    fn test_same_mode_re_registration_replaces_value() {
        let factory = factory_with(vec![
            AttributeWrite {
                name: "region".to_string(),
                value: json!("sg-one-north"),
                mode: WriteMode::Overwrite,
                ..Default::default()
            },
            AttributeWrite {
                name: "region".to_string(),
                value: json!("us-east-1"),
                mode: WriteMode::Overwrite,
                ..Default::default()
            },
        ]);
        let expression = factory
            .compile(CompileArgs::default())
            .unwrap()
            .into_standalone()
            .unwrap();
        assert_eq!(
            expression.expression_attribute_values,
            collections::HashMap::from([(
                ":region".to_string(),
                types::AttributeValue::S("us-east-1".to_string()),
            )]),
        );
    }

    #[rstest]
    #[case::create_only(WriteMode::CreateOnly)]
    #[case::overwrite(WriteMode::Overwrite)]
    fn test_null_index_binding_fails(#[case] mode: WriteMode) {
        let mut factory = UpdateExpressionFactory::new("pk1", "sk1");
        let err = factory
            .add(AttributeWrite {
                name: "region".to_string(),
                value: json!("sg-one-north"),
                index_bindings: IndexMap::from([(
                    "gsi_session_pk_region".to_string(),
                    Value::Null,
                )]),
                mode,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            UpdateExpressionError::NullIndexValue(name) if name == "gsi_session_pk_region",
        ));
    }

    #[test]
    fn test_null_plain_value_is_allowed() {
        let factory = factory_with(vec![AttributeWrite {
            name: "comment".to_string(),
            value: Value::Null,
            ..Default::default()
        }]);
        assert!(factory.compile(CompileArgs::default()).is_ok());
    }

    #[test]
    fn test_compile_without_attributes_fails() {
        let factory = UpdateExpressionFactory::new("pk1", "sk1");
        let err = factory.compile(CompileArgs::default()).unwrap_err();
        assert!(matches!(err, UpdateExpressionError::NoAttributes));
    }

    #[rstest]
    #[case::transaction_without_table(
        CompileArgs {
            as_transaction: true,
            ..Default::default()
        },
    )]
    #[case::table_without_transaction(
        CompileArgs {
            table_name: Some("MyTable".to_string()),
            ..Default::default()
        },
    )]
    #[case::return_values_in_transaction(
        CompileArgs {
            as_transaction: true,
            table_name: Some("MyTable".to_string()),
            return_values: Some(types::ReturnValue::AllNew),
        },
    )]
    fn test_invalid_compile_args(#[case] args: CompileArgs) {
        let factory = factory_with(vec![AttributeWrite {
            name: "region".to_string(),
            value: json!("sg-one-north"),
            ..Default::default()
        }]);
        assert!(matches!(
            factory.compile(args).unwrap_err(),
            UpdateExpressionError::MissingTableName
                | UpdateExpressionError::UnexpectedTableName
                | UpdateExpressionError::ReturnValuesInTransaction,
        ));
    }

    #[test]
    fn test_return_values_pass_through_in_standalone_mode() {
        let factory = factory_with(vec![AttributeWrite {
            name: "region".to_string(),
            value: json!("sg-one-north"),
            ..Default::default()
        }]);
        let expression = factory
            .compile(CompileArgs {
                return_values: Some(types::ReturnValue::AllOld),
                ..Default::default()
            })
            .unwrap()
            .into_standalone()
            .unwrap();
        assert_eq!(expression.return_values, types::ReturnValue::AllOld);
    }

    #[test]
    fn test_compile_is_repeatable() {
        let factory = factory_with(vec![AttributeWrite {
            name: "region".to_string(),
            value: json!("sg-one-north"),
            ..Default::default()
        }]);
        let first = factory.compile(CompileArgs::default()).unwrap();
        let second = factory.compile(CompileArgs::default()).unwrap();
        assert_eq!(first, second);
    }
}
