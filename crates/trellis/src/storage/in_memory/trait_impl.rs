//! Storage trait implementations for in-memory storage.

use super::InMemoryStorage;
use crate::domain::{ClosureEntry, Edge, Requirement, RequirementId, ScopeId, TreeNode, validate_id};
use crate::error::{Error, Result};
use crate::storage::{RelationshipStore, RequirementCatalog, build_tree_rows};
use async_trait::async_trait;

#[async_trait]
impl RelationshipStore for InMemoryStorage {
    async fn insert_edge(
        &mut self,
        scope: &ScopeId,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<usize> {
        let mut inner = self.lock().await;
        inner.insert_edge(scope, ancestor, descendant)
    }

    async fn delete_edge(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<usize> {
        let mut inner = self.lock().await;
        inner.delete_edge(ancestor, descendant)
    }

    async fn move_edge(
        &mut self,
        scope: &ScopeId,
        old_ancestor: Option<&RequirementId>,
        new_ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<(usize, usize)> {
        let mut inner = self.lock().await;
        inner.move_edge(scope, old_ancestor, new_ancestor, descendant)
    }

    async fn has_path(&self, from: &RequirementId, to: &RequirementId) -> Result<bool> {
        let inner = self.lock().await;
        Ok(inner.has_path(from, to))
    }

    async fn has_edge(&self, ancestor: &RequirementId, descendant: &RequirementId) -> Result<bool> {
        let inner = self.lock().await;
        Ok(inner.has_edge(ancestor, descendant))
    }

    async fn direct_parents(&self, id: &RequirementId) -> Result<Vec<RequirementId>> {
        let inner = self.lock().await;
        Ok(inner.direct_parents(id))
    }

    async fn list_ancestors(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Result<Vec<ClosureEntry>> {
        let inner = self.lock().await;
        Ok(inner.list_ancestors(id, max_depth))
    }

    async fn list_descendants(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Result<Vec<ClosureEntry>> {
        let inner = self.lock().await;
        Ok(inner.list_descendants(id, max_depth))
    }

    async fn list_tree(&self, scope: &ScopeId) -> Result<Vec<TreeNode>> {
        let inner = self.lock().await;
        let edges = inner
            .scope_edges(scope)
            .into_iter()
            .map(|edge| (edge.ancestor, edge.descendant));
        Ok(build_tree_rows(edges))
    }

    async fn list_edges(&self, scope: &ScopeId) -> Result<Vec<Edge>> {
        let inner = self.lock().await;
        Ok(inner.scope_edges(scope))
    }
}

#[async_trait]
impl RequirementCatalog for InMemoryStorage {
    async fn put_requirement(&mut self, requirement: Requirement) -> Result<()> {
        validate_id(requirement.id.as_str()).map_err(Error::Validation)?;
        validate_id(requirement.scope.as_str()).map_err(Error::Validation)?;

        let mut inner = self.lock().await;

        if let Some(existing) = inner.requirements.get(&requirement.id)
            && existing.scope != requirement.scope
            && inner.is_linked(&requirement.id)
        {
            return Err(Error::Validation(format!(
                "cannot move linked requirement {} from scope {} to {}",
                requirement.id, existing.scope, requirement.scope
            )));
        }

        inner
            .requirements
            .insert(requirement.id.clone(), requirement);
        Ok(())
    }

    async fn get_requirement(&self, id: &RequirementId) -> Result<Option<Requirement>> {
        let inner = self.lock().await;
        Ok(inner.requirements.get(id).cloned())
    }

    async fn list_requirements(&self, scope: &ScopeId) -> Result<Vec<Requirement>> {
        let inner = self.lock().await;
        let mut requirements: Vec<Requirement> = inner
            .requirements
            .values()
            .filter(|r| &r.scope == scope)
            .cloned()
            .collect();
        requirements.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(requirements)
    }
}
