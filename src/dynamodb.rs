//! DynamoDB wrappers.
//!
//! This module provides:
//! - a table wrapper translating SDK errors into a typed taxonomy and
//!   carrying a single-page pagination helper
//! - the update-expression compiler, which turns a set of pending attribute
//!   writes into one conditional `UpdateExpression`, either standalone or
//!   wrapped for a multi-item transaction

/// Table wrapper client.
pub mod table;

/// Update-expression compiler.
pub mod update_expression;
