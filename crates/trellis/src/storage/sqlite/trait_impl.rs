//! Storage trait implementations for the SQLite backend.

use super::{SqliteStorage, closure};
use crate::domain::{ClosureEntry, Edge, Requirement, RequirementId, ScopeId, TreeNode, validate_id};
use crate::error::{Error, Result};
use crate::storage::{RelationshipStore, RequirementCatalog, build_tree_rows};
use async_trait::async_trait;
use rusqlite::{OptionalExtension, TransactionBehavior, params};

#[async_trait]
impl RelationshipStore for SqliteStorage {
    async fn insert_edge(
        &mut self,
        scope: &ScopeId,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let created = closure::insert_edge(&tx, scope, ancestor, descendant)?;
        tx.commit()?;
        Ok(created)
    }

    async fn delete_edge(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = closure::delete_edge(&tx, ancestor, descendant)?;
        tx.commit()?;
        Ok(deleted)
    }

    async fn move_edge(
        &mut self,
        scope: &ScopeId,
        old_ancestor: Option<&RequirementId>,
        new_ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<(usize, usize)> {
        if old_ancestor == Some(new_ancestor) {
            return Err(Error::Duplicate {
                ancestor: new_ancestor.clone(),
                descendant: descendant.clone(),
            });
        }

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Dropping the transaction on error rolls both halves back
        let deleted = match old_ancestor {
            Some(old) => closure::delete_edge(&tx, old, descendant)?,
            None => 0,
        };
        let created = closure::insert_edge(&tx, scope, new_ancestor, descendant)?;

        tx.commit()?;
        Ok((deleted, created))
    }

    async fn has_path(&self, from: &RequirementId, to: &RequirementId) -> Result<bool> {
        let conn = self.connection()?;
        closure::has_path(&conn, from, to)
    }

    async fn has_edge(&self, ancestor: &RequirementId, descendant: &RequirementId) -> Result<bool> {
        let conn = self.connection()?;
        closure::has_edge(&conn, ancestor, descendant)
    }

    async fn direct_parents(&self, id: &RequirementId) -> Result<Vec<RequirementId>> {
        let conn = self.connection()?;
        closure::direct_parents(&conn, id)
    }

    async fn list_ancestors(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Result<Vec<ClosureEntry>> {
        let conn = self.connection()?;
        closure::list_ancestors(&conn, id, max_depth)
    }

    async fn list_descendants(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Result<Vec<ClosureEntry>> {
        let conn = self.connection()?;
        closure::list_descendants(&conn, id, max_depth)
    }

    async fn list_tree(&self, scope: &ScopeId) -> Result<Vec<TreeNode>> {
        let edges = {
            let conn = self.connection()?;
            closure::scope_edges(&conn, scope)?
        };
        Ok(build_tree_rows(
            edges.into_iter().map(|edge| (edge.ancestor, edge.descendant)),
        ))
    }

    async fn list_edges(&self, scope: &ScopeId) -> Result<Vec<Edge>> {
        let conn = self.connection()?;
        closure::scope_edges(&conn, scope)
    }
}

#[async_trait]
impl RequirementCatalog for SqliteStorage {
    async fn put_requirement(&mut self, requirement: Requirement) -> Result<()> {
        validate_id(requirement.id.as_str()).map_err(Error::Validation)?;
        validate_id(requirement.scope.as_str()).map_err(Error::Validation)?;

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing_scope: Option<String> = tx
            .query_row(
                "SELECT scope FROM requirements WHERE id = ?1",
                [requirement.id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(existing) = existing_scope
            && existing != requirement.scope.as_str()
            && closure::is_linked(&tx, &requirement.id)?
        {
            return Err(Error::Validation(format!(
                "cannot move linked requirement {} from scope {} to {}",
                requirement.id, existing, requirement.scope
            )));
        }

        tx.execute(
            "INSERT INTO requirements (id, scope, name, external_id, description)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (id) DO UPDATE SET
                 scope = excluded.scope,
                 name = excluded.name,
                 external_id = excluded.external_id,
                 description = excluded.description",
            params![
                requirement.id.as_str(),
                requirement.scope.as_str(),
                requirement.name,
                requirement.external_id,
                requirement.description
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn get_requirement(&self, id: &RequirementId) -> Result<Option<Requirement>> {
        let conn = self.connection()?;
        let requirement = conn
            .query_row(
                "SELECT id, scope, name, external_id, description FROM requirements WHERE id = ?1",
                [id.as_str()],
                row_to_requirement,
            )
            .optional()?;
        Ok(requirement)
    }

    async fn list_requirements(&self, scope: &ScopeId) -> Result<Vec<Requirement>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, scope, name, external_id, description FROM requirements
             WHERE scope = ?1 ORDER BY id",
        )?;
        let requirements = stmt
            .query_map([scope.as_str()], row_to_requirement)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(requirements)
    }
}

fn row_to_requirement(row: &rusqlite::Row<'_>) -> rusqlite::Result<Requirement> {
    Ok(Requirement {
        id: RequirementId::new(row.get::<_, String>(0)?),
        scope: ScopeId::new(row.get::<_, String>(1)?),
        name: row.get(2)?,
        external_id: row.get(3)?,
        description: row.get(4)?,
    })
}
