//! Error types for trellis operations.
//!
//! The taxonomy follows the layers of the engine:
//!
//! - The storage layer surfaces [`Error::RelationshipNotFound`],
//!   [`Error::Duplicate`] and [`Error::Persistence`], plus [`Error::Cycle`]
//!   when its own in-transaction re-check rejects an edge.
//! - The relationship service adds [`Error::Validation`] and raises
//!   [`Error::Cycle`] from its pre-checks; storage errors pass through unchanged.
//! - The drag-and-drop reconciler adds [`Error::PartialMove`] when the first
//!   half of a two-step move succeeded and the second failed.
//!
//! [`Error::Io`] and [`Error::Config`] belong to the CLI/workspace plumbing.

use crate::domain::RequirementId;
use std::io;
use thiserror::Error;

/// The error type for trellis operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before touching storage (self-link, missing or unknown ids).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The relationship would close a loop in the graph.
    #[error("Circular reference: {descendant} is already an ancestor of {ancestor}")]
    Cycle {
        /// Proposed ancestor.
        ancestor: RequirementId,
        /// Proposed descendant.
        descendant: RequirementId,
    },

    /// The direct relationship already exists.
    #[error("Relationship already exists: {ancestor} -> {descendant}")]
    Duplicate {
        /// Existing ancestor.
        ancestor: RequirementId,
        /// Existing descendant.
        descendant: RequirementId,
    },

    /// The direct relationship does not exist.
    #[error("Relationship not found: {ancestor} -> {descendant}")]
    RelationshipNotFound {
        /// Requested ancestor.
        ancestor: RequirementId,
        /// Requested descendant.
        descendant: RequirementId,
    },

    /// The requirement is not known to the catalog.
    #[error("Requirement not found: {0}")]
    RequirementNotFound(RequirementId),

    /// Transaction or storage failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A two-step move deleted the old edge but failed to create the new one.
    ///
    /// The dragged requirement is left without the old parent. Retrying only the
    /// create step (`target -> dragged`) completes the move.
    #[error(
        "Partial move: unlinked {dragged} from {old_parent} but failed to link it under {target}: {source}"
    )]
    PartialMove {
        /// The requirement being moved.
        dragged: RequirementId,
        /// The parent edge that was removed.
        old_parent: RequirementId,
        /// The intended new parent.
        target: RequirementId,
        /// Why the create step failed.
        #[source]
        source: Box<Error>,
    },

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`Error`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::Cycle`].
    Cycle,
    /// See [`Error::Duplicate`].
    Duplicate,
    /// Either [`Error::RelationshipNotFound`] or [`Error::RequirementNotFound`].
    NotFound,
    /// Storage, IO and configuration failures.
    Persistence,
    /// See [`Error::PartialMove`].
    PartialMove,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Cycle { .. } => ErrorKind::Cycle,
            Error::Duplicate { .. } => ErrorKind::Duplicate,
            Error::RelationshipNotFound { .. } | Error::RequirementNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::Persistence(_) | Error::Io(_) | Error::Config(_) => ErrorKind::Persistence,
            Error::PartialMove { .. } => ErrorKind::PartialMove,
        }
    }

    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(msg) => format!("Invalid request: {msg}"),
            Error::Cycle { .. } => {
                "Cannot create relationship: it would create a circular reference".to_string()
            }
            Error::Duplicate { .. } => "These requirements are already linked".to_string(),
            Error::RelationshipNotFound { .. } => "Relationship no longer exists".to_string(),
            Error::RequirementNotFound(id) => format!("Requirement {id} was not found"),
            Error::PartialMove {
                dragged, target, ..
            } => format!(
                "{dragged} was detached from its old parent but could not be linked under {target}. Retry linking it."
            ),
            Error::Persistence(_) | Error::Io(_) | Error::Config(_) => {
                "The relationship could not be saved. Please try again.".to_string()
            }
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}

/// A specialized Result type for trellis operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups_not_found_variants() {
        let rel = Error::RelationshipNotFound {
            ancestor: RequirementId::new("A"),
            descendant: RequirementId::new("B"),
        };
        let req = Error::RequirementNotFound(RequirementId::new("A"));
        assert_eq!(rel.kind(), ErrorKind::NotFound);
        assert_eq!(req.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_partial_move_keeps_source() {
        let err = Error::PartialMove {
            dragged: RequirementId::new("B"),
            old_parent: RequirementId::new("A"),
            target: RequirementId::new("D"),
            source: Box::new(Error::Persistence("disk full".to_string())),
        };
        assert_eq!(err.kind(), ErrorKind::PartialMove);
        assert!(err.to_string().contains("disk full"));
        assert!(err.user_message().contains("Retry"));
    }

    #[test]
    fn test_sqlite_errors_become_persistence() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }
}
