//! Closure-table SQL.
//!
//! Every function here takes a plain `&Connection` so it can run either on the
//! connection itself (reads) or on an open transaction (mutations; a
//! `Transaction` derefs to `Connection`).

use super::schema::SCRATCH;
use crate::domain::{ClosureEntry, Edge, RequirementId, ScopeId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

/// Convert a stored depth back into a `usize`.
fn to_depth(raw: i64) -> Result<usize> {
    usize::try_from(raw).map_err(|_| Error::Persistence(format!("invalid closure depth {raw}")))
}

fn to_sql_depth(depth: Option<usize>) -> Option<i64> {
    depth.map(|d| i64::try_from(d).unwrap_or(i64::MAX))
}

pub(super) fn has_edge(
    conn: &Connection,
    ancestor: &RequirementId,
    descendant: &RequirementId,
) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM edges WHERE ancestor_id = ?1 AND descendant_id = ?2",
            params![ancestor.as_str(), descendant.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(super) fn has_path(conn: &Connection, from: &RequirementId, to: &RequirementId) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM closure WHERE ancestor_id = ?1 AND descendant_id = ?2 AND depth > 0",
            params![from.as_str(), to.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Pairs of `ancestors*(a) x descendants*(d)` with no closure row yet.
///
/// Only the product is read, so the cost is independent of the rest of the
/// table. Self rows for both endpoints must already exist.
fn count_new_pairs(
    conn: &Connection,
    ancestor: &RequirementId,
    descendant: &RequirementId,
) -> Result<usize> {
    let (total, existing): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COUNT(existing.depth)
         FROM closure AS up
         JOIN closure AS down ON down.ancestor_id = ?2
         LEFT JOIN closure AS existing
           ON existing.ancestor_id = up.ancestor_id
          AND existing.descendant_id = down.descendant_id
         WHERE up.descendant_id = ?1",
        params![ancestor.as_str(), descendant.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    to_depth(total - existing)
}

/// Reject edges that already exist or that would close a loop.
fn check_insertable(
    conn: &Connection,
    ancestor: &RequirementId,
    descendant: &RequirementId,
) -> Result<()> {
    if ancestor == descendant || has_path(conn, descendant, ancestor)? {
        return Err(Error::Cycle {
            ancestor: ancestor.clone(),
            descendant: descendant.clone(),
        });
    }
    if has_edge(conn, ancestor, descendant)? {
        return Err(Error::Duplicate {
            ancestor: ancestor.clone(),
            descendant: descendant.clone(),
        });
    }
    Ok(())
}

/// Insert `ancestor -> descendant` and extend the closure.
///
/// Returns the number of closure rows that did not exist before.
pub(super) fn insert_edge(
    conn: &Connection,
    scope: &ScopeId,
    ancestor: &RequirementId,
    descendant: &RequirementId,
) -> Result<usize> {
    check_insertable(conn, ancestor, descendant)?;

    conn.execute(
        "INSERT INTO edges (ancestor_id, descendant_id, scope, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            ancestor.as_str(),
            descendant.as_str(),
            scope.as_str(),
            Utc::now().to_rfc3339()
        ],
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO closure (ancestor_id, descendant_id, depth) VALUES (?1, ?1, 0), (?2, ?2, 0)",
        params![ancestor.as_str(), descendant.as_str()],
    )?;

    let created = count_new_pairs(conn, ancestor, descendant)?;

    // (x, a, dx) x (d, y, dy) -> (x, y, dx + dy + 1), keeping the shortest
    conn.execute(
        "INSERT INTO closure (ancestor_id, descendant_id, depth)
         SELECT up.ancestor_id, down.descendant_id, up.depth + down.depth + 1
         FROM closure AS up, closure AS down
         WHERE up.descendant_id = ?1 AND down.ancestor_id = ?2
         ON CONFLICT (ancestor_id, descendant_id) DO UPDATE SET depth = MIN(depth, excluded.depth)",
        params![ancestor.as_str(), descendant.as_str()],
    )?;

    tracing::debug!(%ancestor, %descendant, created, "Extended closure");
    Ok(created)
}

/// Delete `ancestor -> descendant` and repair the closure.
///
/// Returns the net number of closure rows that disappeared.
pub(super) fn delete_edge(
    conn: &Connection,
    ancestor: &RequirementId,
    descendant: &RequirementId,
) -> Result<usize> {
    if !has_edge(conn, ancestor, descendant)? {
        return Err(Error::RelationshipNotFound {
            ancestor: ancestor.clone(),
            descendant: descendant.clone(),
        });
    }

    conn.execute_batch(SCRATCH)?;
    conn.execute("DELETE FROM affected_ancestors", [])?;
    conn.execute("DELETE FROM affected_descendants", [])?;

    // Both sets include the endpoint itself through its depth-0 self row
    conn.execute(
        "INSERT INTO affected_ancestors (id) SELECT ancestor_id FROM closure WHERE descendant_id = ?1",
        params![ancestor.as_str()],
    )?;
    conn.execute(
        "INSERT INTO affected_descendants (id) SELECT descendant_id FROM closure WHERE ancestor_id = ?1",
        params![descendant.as_str()],
    )?;

    conn.execute(
        "DELETE FROM edges WHERE ancestor_id = ?1 AND descendant_id = ?2",
        params![ancestor.as_str(), descendant.as_str()],
    )?;

    let removed = conn.execute(
        "DELETE FROM closure
         WHERE depth > 0
           AND ancestor_id IN (SELECT id FROM affected_ancestors)
           AND descendant_id IN (SELECT id FROM affected_descendants)",
        [],
    )?;

    // Re-derive the affected pairs from the remaining direct edges
    let reinstated = conn.execute(
        "WITH RECURSIVE reach(root, node, depth) AS (
             SELECT id, id, 0 FROM affected_ancestors
             UNION
             SELECT reach.root, edges.descendant_id, reach.depth + 1
             FROM reach JOIN edges ON edges.ancestor_id = reach.node
         )
         INSERT INTO closure (ancestor_id, descendant_id, depth)
         SELECT root, node, MIN(depth) FROM reach
         WHERE root <> node AND node IN (SELECT id FROM affected_descendants)
         GROUP BY root, node",
        [],
    )?;

    tracing::debug!(%ancestor, %descendant, removed, reinstated, "Repaired closure");
    Ok(removed - reinstated)
}

pub(super) fn direct_parents(conn: &Connection, id: &RequirementId) -> Result<Vec<RequirementId>> {
    let mut stmt = conn.prepare(
        "SELECT ancestor_id FROM edges WHERE descendant_id = ?1 ORDER BY ancestor_id",
    )?;
    let parents = stmt
        .query_map([id.as_str()], |row| row.get::<_, String>(0))?
        .map(|r| r.map(RequirementId::from))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(parents)
}

pub(super) fn list_ancestors(
    conn: &Connection,
    id: &RequirementId,
    max_depth: Option<usize>,
) -> Result<Vec<ClosureEntry>> {
    collect_entries(
        conn,
        "SELECT ancestor_id, depth FROM closure
         WHERE descendant_id = ?1 AND depth > 0 AND (?2 IS NULL OR depth <= ?2)
         ORDER BY depth, ancestor_id",
        id,
        max_depth,
    )
}

pub(super) fn list_descendants(
    conn: &Connection,
    id: &RequirementId,
    max_depth: Option<usize>,
) -> Result<Vec<ClosureEntry>> {
    collect_entries(
        conn,
        "SELECT descendant_id, depth FROM closure
         WHERE ancestor_id = ?1 AND depth > 0 AND (?2 IS NULL OR depth <= ?2)
         ORDER BY depth, descendant_id",
        id,
        max_depth,
    )
}

fn collect_entries(
    conn: &Connection,
    sql: &str,
    id: &RequirementId,
    max_depth: Option<usize>,
) -> Result<Vec<ClosureEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![id.as_str(), to_sql_depth(max_depth)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(other, depth)| {
            Ok(ClosureEntry {
                requirement_id: RequirementId::new(other),
                depth: to_depth(depth)?,
            })
        })
        .collect()
}

pub(super) fn scope_edges(conn: &Connection, scope: &ScopeId) -> Result<Vec<Edge>> {
    let mut stmt = conn.prepare(
        "SELECT ancestor_id, descendant_id, created_at FROM edges
         WHERE scope = ?1
         ORDER BY created_at, ancestor_id, descendant_id",
    )?;
    let rows = stmt
        .query_map([scope.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(ancestor, descendant, created_at)| {
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| Error::Persistence(format!("invalid edge timestamp: {e}")))?
                .with_timezone(&Utc);
            Ok(Edge {
                scope: scope.clone(),
                ancestor: RequirementId::new(ancestor),
                descendant: RequirementId::new(descendant),
                created_at,
            })
        })
        .collect()
}

pub(super) fn is_linked(conn: &Connection, id: &RequirementId) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM edges WHERE ancestor_id = ?1 OR descendant_id = ?1 LIMIT 1",
            [id.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}
