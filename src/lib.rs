#![deny(missing_docs)]
#![deny(warnings)]

//! # AWS Clients
//!
//! Thin, type-safe wrapper clients for AWS services.
//!
//! ## Overview
//!
//! This library wraps the per-service AWS SDK clients behind small,
//! resource-oriented types (a DynamoDB table, an S3 bucket, an SQS queue, an
//! SNS topic, a Lambda function, the SSM Parameter Store) that:
//! - translate SDK errors into a small typed error taxonomy per service
//! - compile DynamoDB update expressions from structured attribute writes,
//!   with create-if-absent and overwrite semantics reconciled for you
//! - convert attribute names between `snake_case` and the DynamoDB
//!   `PascalCase` convention (with `GSI`/`PK`/`SK` markers)
//! - cache configuration values read from the Parameter Store for a bounded
//!   time
//!
//! The SDK clients themselves are constructed by the caller and handed to the
//! wrappers: this crate takes no stance on regions, credentials, retries or
//! endpoints, and holds no global state.
//!
//! ## Quick Example
//!
//! Instead of assembling a conditional update expression by hand, register
//! the pending writes and compile them:
//!
//! ```rust
//! use aws_clients::dynamodb::update_expression;
//! use indexmap::IndexMap;
//!
//! # fn main() -> Result<(), update_expression::UpdateExpressionError> {
//! let mut factory = update_expression::UpdateExpressionFactory::new("session-1", "run-42");
//! // Written only when the attribute is absent, together with its bound
//! // secondary-index attribute.
//! factory.add(update_expression::AttributeWrite {
//!     name: "region".to_string(),
//!     value: "sg-one-north",
//!     index_bindings: IndexMap::from([
//!         ("gsi_session_pk_region".to_string(), "sg-one-north"),
//!     ]),
//!     ..Default::default()
//! })?;
//! let compiled = factory.compile(update_expression::CompileArgs::default())?;
//! // The crate builds: "SET #region = if_not_exists(#region, :region),
//! //                    #gsi_session_pk_region = if_not_exists(#gsi_session_pk_region, :gsi_session_pk_region)"
//! # let _ = compiled;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@common`] - Shared utilities: name transform, timed cache, error classification
//! - [`mod@dynamodb`] - DynamoDB table wrapper and the update-expression compiler
//! - [`mod@s3`] - S3 bucket wrapper
//! - [`mod@sqs`] - SQS queue wrapper
//! - [`mod@sns`] - SNS topic wrapper
//! - [`mod@lambda`] - Lambda function wrapper
//! - [`mod@ssm`] - Parameter Store wrapper with a timed configuration cache

/// Shared utilities: attribute-name transform, timed cache, error classification.
pub mod common;

/// DynamoDB table wrapper and the update-expression compiler.
pub mod dynamodb;

/// Lambda function wrapper.
pub mod lambda;

/// S3 bucket wrapper.
pub mod s3;

/// SNS topic wrapper.
pub mod sns;

/// SQS queue wrapper.
pub mod sqs;

/// SSM Parameter Store wrapper.
pub mod ssm;
