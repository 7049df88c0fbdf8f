//! Validated relationship mutations.
//!
//! [`RelationshipService`] is the only way edges are created, deleted or moved.
//! It rejects malformed requests before they reach storage, then lets the store
//! re-run its own cycle and duplicate checks inside the mutation itself.

use crate::domain::{
    CreateOutcome, DeleteOutcome, MoveOutcome, Requirement, RequirementId, ScopeId,
};
use crate::error::{Error, Result};
use crate::storage::TraceStorage;
use async_trait::async_trait;

/// The relationship mutations a caller can issue.
///
/// The drag-and-drop reconciler is written against this trait rather than the
/// concrete service so that it can run against any implementation.
#[async_trait]
pub trait RelationshipCommands: Send {
    /// Link `ancestor -> descendant`.
    async fn create_relationship(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<CreateOutcome>;

    /// Unlink `ancestor -> descendant`.
    async fn delete_relationship(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<DeleteOutcome>;

    /// Re-parent `descendant` from `old_ancestor` (if any) to `new_ancestor`
    /// in a single atomic step.
    async fn move_relationship(
        &mut self,
        old_ancestor: Option<&RequirementId>,
        new_ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<MoveOutcome>;
}

/// Applies relationship mutations to a storage backend after validating them.
pub struct RelationshipService<'a, S: TraceStorage + ?Sized> {
    storage: &'a mut S,
}

impl<'a, S: TraceStorage + ?Sized> RelationshipService<'a, S> {
    /// Wrap a storage backend.
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    /// Check the endpoints of a prospective edge and return their shared scope.
    ///
    /// # Errors
    ///
    /// - `Validation` for self-links, malformed or unknown ids, and ids that
    ///   belong to different scopes
    /// - `Cycle` when `descendant` already reaches `ancestor`
    /// - `Duplicate` when the direct edge already exists
    pub async fn validate_link(
        &self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<ScopeId> {
        if ancestor == descendant {
            return Err(Error::Validation(format!(
                "a requirement cannot be related to itself ({ancestor})"
            )));
        }

        let ancestor_req = self.known_requirement(ancestor, "ancestor").await?;
        let descendant_req = self.known_requirement(descendant, "descendant").await?;

        if ancestor_req.scope != descendant_req.scope {
            return Err(Error::Validation(format!(
                "{ancestor} belongs to project {} but {descendant} belongs to project {}",
                ancestor_req.scope, descendant_req.scope
            )));
        }

        if self.storage.has_path(descendant, ancestor).await? {
            return Err(Error::Cycle {
                ancestor: ancestor.clone(),
                descendant: descendant.clone(),
            });
        }

        if self.storage.has_edge(ancestor, descendant).await? {
            return Err(Error::Duplicate {
                ancestor: ancestor.clone(),
                descendant: descendant.clone(),
            });
        }

        Ok(ancestor_req.scope)
    }

    async fn known_requirement(&self, id: &RequirementId, role: &str) -> Result<Requirement> {
        if id.as_str().trim().is_empty() {
            return Err(Error::Validation(format!("{role} id is required")));
        }
        self.storage
            .get_requirement(id)
            .await?
            .ok_or_else(|| Error::Validation(format!("unknown {role} requirement {id}")))
    }

    /// Create the direct relationship `ancestor -> descendant`.
    ///
    /// # Errors
    ///
    /// See [`Self::validate_link`]; storage errors pass through unchanged.
    pub async fn create(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<CreateOutcome> {
        let scope = self
            .validate_link(ancestor, descendant)
            .await
            .inspect_err(|e| tracing::warn!(%ancestor, %descendant, error = %e, "Rejected relationship"))?;

        let created = self.storage.insert_edge(&scope, ancestor, descendant).await?;
        tracing::info!(%scope, %ancestor, %descendant, created, "Created relationship");

        Ok(CreateOutcome {
            success: true,
            relationships_created: created,
            message: format!("{created} relationships created"),
        })
    }

    /// Delete the direct relationship `ancestor -> descendant`.
    ///
    /// # Errors
    ///
    /// Returns `RelationshipNotFound` when the edge does not exist.
    pub async fn delete(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<DeleteOutcome> {
        if ancestor.as_str().trim().is_empty() || descendant.as_str().trim().is_empty() {
            return Err(Error::Validation(
                "both ancestor and descendant ids are required".to_string(),
            ));
        }

        let deleted = self
            .storage
            .delete_edge(ancestor, descendant)
            .await
            .inspect_err(|e| tracing::warn!(%ancestor, %descendant, error = %e, "Delete failed"))?;
        tracing::info!(%ancestor, %descendant, deleted, "Deleted relationship");

        Ok(DeleteOutcome {
            success: true,
            relationships_deleted: deleted,
            message: format!("{deleted} relationships deleted"),
        })
    }

    /// Replace `old_ancestor -> descendant` with `new_ancestor -> descendant`
    /// atomically. With no old ancestor this behaves like [`Self::create`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::validate_link`] for the new edge, plus
    /// `RelationshipNotFound` when the old edge does not exist. Nothing changes
    /// on failure.
    pub async fn relocate(
        &mut self,
        old_ancestor: Option<&RequirementId>,
        new_ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<MoveOutcome> {
        if old_ancestor == Some(new_ancestor) {
            return Err(Error::Duplicate {
                ancestor: new_ancestor.clone(),
                descendant: descendant.clone(),
            });
        }

        let scope = self
            .validate_link(new_ancestor, descendant)
            .await
            .inspect_err(|e| tracing::warn!(%new_ancestor, %descendant, error = %e, "Rejected move"))?;

        let (deleted, created) = self
            .storage
            .move_edge(&scope, old_ancestor, new_ancestor, descendant)
            .await?;

        tracing::info!(
            %scope,
            old_ancestor = old_ancestor.map(RequirementId::as_str),
            %new_ancestor,
            %descendant,
            deleted,
            created,
            "Moved relationship"
        );

        Ok(MoveOutcome {
            success: true,
            relationships_deleted: deleted,
            relationships_created: created,
            message: format!("Moved {descendant} under {new_ancestor}"),
        })
    }

    /// Register or update a requirement in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed ids or a scope change of a linked
    /// requirement.
    pub async fn register(&mut self, requirement: Requirement) -> Result<()> {
        let id = requirement.id.clone();
        self.storage.put_requirement(requirement).await?;
        tracing::debug!(%id, "Registered requirement");
        Ok(())
    }
}

#[async_trait]
impl<S: TraceStorage + ?Sized> RelationshipCommands for RelationshipService<'_, S> {
    async fn create_relationship(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<CreateOutcome> {
        self.create(ancestor, descendant).await
    }

    async fn delete_relationship(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<DeleteOutcome> {
        self.delete(ancestor, descendant).await
    }

    async fn move_relationship(
        &mut self,
        old_ancestor: Option<&RequirementId>,
        new_ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<MoveOutcome> {
        self.relocate(old_ancestor, new_ancestor, descendant).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::in_memory::new_in_memory_storage;
    use rstest::rstest;

    fn id(s: &str) -> RequirementId {
        RequirementId::new(s)
    }

    async fn seeded(names: &[(&str, &str)]) -> Box<dyn TraceStorage> {
        let mut storage = new_in_memory_storage();
        for (name, scope) in names {
            storage
                .put_requirement(Requirement::new(*name, *scope, *name))
                .await
                .unwrap();
        }
        storage
    }

    #[tokio::test]
    async fn test_self_link_is_validation_error() {
        let mut storage = seeded(&[("A", "p")]).await;
        let mut service = RelationshipService::new(storage.as_mut());

        let err = service.create(&id("A"), &id("A")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[rstest]
    #[case::unknown_ancestor("X", "A")]
    #[case::unknown_descendant("A", "X")]
    #[case::empty_ancestor("", "A")]
    #[tokio::test]
    async fn test_unknown_or_missing_ids_are_rejected(#[case] a: &str, #[case] d: &str) {
        let mut storage = seeded(&[("A", "p")]).await;
        let mut service = RelationshipService::new(storage.as_mut());

        let err = service.create(&id(a), &id(d)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_cross_scope_link_is_rejected() {
        let mut storage = seeded(&[("A", "p1"), ("B", "p2")]).await;
        let mut service = RelationshipService::new(storage.as_mut());

        let err = service.create(&id("A"), &id("B")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("project")));
    }

    #[tokio::test]
    async fn test_create_reports_created_rows() {
        let mut storage = seeded(&[("A", "p"), ("B", "p"), ("C", "p")]).await;
        let mut service = RelationshipService::new(storage.as_mut());

        service.create(&id("A"), &id("B")).await.unwrap();
        let outcome = service.create(&id("B"), &id("C")).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.relationships_created, 2);
        assert_eq!(outcome.message, "2 relationships created");
    }

    #[tokio::test]
    async fn test_move_to_same_parent_is_duplicate() {
        let mut storage = seeded(&[("A", "p"), ("B", "p")]).await;
        let mut service = RelationshipService::new(storage.as_mut());
        service.create(&id("A"), &id("B")).await.unwrap();

        let err = service
            .relocate(Some(&id("A")), &id("A"), &id("B"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Duplicate);
    }

    #[tokio::test]
    async fn test_move_reparents_atomically() {
        let mut storage = seeded(&[("A", "p"), ("B", "p"), ("D", "p")]).await;
        let mut service = RelationshipService::new(storage.as_mut());
        service.create(&id("A"), &id("B")).await.unwrap();
        service.create(&id("A"), &id("D")).await.unwrap();

        let outcome = service
            .relocate(Some(&id("A")), &id("D"), &id("B"))
            .await
            .unwrap();
        // (A,B) disappears with the old edge; (D,B) and (A,B) via D come back
        assert_eq!(outcome.relationships_deleted, 1);
        assert_eq!(outcome.relationships_created, 2);

        assert!(storage.has_edge(&id("D"), &id("B")).await.unwrap());
        assert!(!storage.has_edge(&id("A"), &id("B")).await.unwrap());
        assert!(storage.has_path(&id("A"), &id("B")).await.unwrap());
    }
}
