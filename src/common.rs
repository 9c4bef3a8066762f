//! Utilities shared across the service wrappers.
//!
//! This module provides the pieces that more than one service client needs:
//! the attribute-name case transform, the timed configuration cache, and the
//! classification of transport/authentication failures common to every AWS
//! SDK call.

/// Process-local time-based cache for configuration values.
pub mod cache;

/// Failure classes shared by every service wrapper.
pub mod error;

/// Bidirectional attribute-name case transform.
pub mod naming;
