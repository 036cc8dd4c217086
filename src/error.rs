//! Error types for entigraph.
//!
//! All errors are strongly typed using thiserror so callers can match on the
//! specific failure. Every failure is synchronous and signals either a
//! precondition violation or a programming error; nothing is retried
//! internally.

use thiserror::Error;

use crate::identity::Identity;

/// Errors produced by the entity graph.
#[derive(Debug, Error)]
pub enum DataError {
    /// `new_entity` was called for an identity the datasource already holds.
    #[error("Entity already managed: {identity}")]
    AlreadyManaged {
        /// The duplicated identity.
        identity: Identity,
    },

    /// Two entities that must share an identity do not.
    #[error("Identity mismatch: expected {expected}, got {actual}")]
    IdentityMismatch {
        /// Identity of the receiving entity.
        expected: Identity,
        /// Identity of the offending entity.
        actual: Identity,
    },

    /// An entity was asked to join or leave itself.
    #[error("Entity cannot join itself: {identity}")]
    SelfJoin {
        /// Identity of the entity.
        identity: Identity,
    },

    /// The entity is already attached to a datasource.
    #[error("Entity already attached to a datasource: {identity}")]
    AlreadyAttached {
        /// Identity of the entity.
        identity: Identity,
    },

    /// The entity is not attached to the datasource that tried to detach it.
    #[error("Entity is not attached to this datasource: {identity}")]
    NotAttached {
        /// Identity of the entity.
        identity: Identity,
    },

    /// The operation is not supported by the receiver.
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// Internal state does not allow the operation.
    #[error("Illegal state: {message}")]
    IllegalState {
        /// Description of the violated state.
        message: String,
    },

    /// A relative identity was requested under a parent that is not managed.
    #[error("Relative identities require a managed parent, got {parent}")]
    InvalidParent {
        /// The rejected parent identity.
        parent: Identity,
    },

    /// A URI is not absolute.
    #[error("Invalid URI: {uri:?}")]
    InvalidUri {
        /// The rejected input.
        uri: String,
    },

    /// A required textual field is empty.
    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        /// Name of the field.
        field: &'static str,
    },

    /// A required builder field was not set.
    #[error("Required field '{field}' is missing")]
    MissingField {
        /// Name of the field.
        field: &'static str,
    },

    /// A deletion strategy name could not be parsed.
    #[error("Unknown deletion strategy: {name}")]
    UnknownDeletionStrategy {
        /// The rejected name.
        name: String,
    },

    /// A merge strategy name could not be parsed.
    #[error("Unknown merge strategy: {name}")]
    UnknownMergeStrategy {
        /// The rejected name.
        name: String,
    },

    /// An entity-valued reference points at an entity that no longer exists.
    #[error("Dangling entity reference: {identity}")]
    DanglingReference {
        /// Identity the reference was created for.
        identity: Identity,
    },

    /// A datasource lock was poisoned by a panicking writer.
    #[error("Poisoned lock: {context}")]
    PoisonedLock {
        /// Operation that observed the poisoned lock.
        context: &'static str,
    },
}

impl DataError {
    /// Creates an illegal-state error.
    #[must_use]
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Returns true if this error reports a violated call precondition.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::IdentityMismatch { .. }
                | Self::SelfJoin { .. }
                | Self::AlreadyAttached { .. }
                | Self::NotAttached { .. }
                | Self::InvalidParent { .. }
                | Self::InvalidUri { .. }
                | Self::EmptyField { .. }
                | Self::MissingField { .. }
        )
    }

    /// Returns true if this error reports a duplicate registration.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::AlreadyManaged { .. })
    }

    /// Returns true if this error reports an unsupported operation or illegal state.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperation { .. }
                | Self::IllegalState { .. }
                | Self::UnknownMergeStrategy { .. }
                | Self::UnknownDeletionStrategy { .. }
        )
    }
}

/// Result type alias for entigraph operations.
pub type DataResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_managed_display() {
        let identity = Identity::external("http://example.org/a").unwrap();
        let err = DataError::AlreadyManaged { identity };
        let msg = format!("{err}");
        assert!(msg.contains("already managed"));
        assert!(msg.contains("http://example.org/a"));
        assert!(err.is_duplicate());
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_unsupported_operation() {
        let err = DataError::UnsupportedOperation {
            operation: "add_property",
        };
        assert!(err.is_unsupported());
        assert!(format!("{err}").contains("add_property"));
    }

    #[test]
    fn test_precondition_classification() {
        let identity = Identity::external("http://example.org/a").unwrap();
        assert!(DataError::SelfJoin { identity }.is_precondition());
        assert!(DataError::EmptyField { field: "path" }.is_precondition());
        assert!(!DataError::illegal_state("boom").is_precondition());
    }

    #[test]
    fn test_unknown_merge_strategy_is_unsupported() {
        let err = DataError::UnknownMergeStrategy {
            name: "by_magic".to_string(),
        };
        assert!(err.is_unsupported());
        assert!(format!("{err}").contains("by_magic"));
    }
}
