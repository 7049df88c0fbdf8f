//! Database schema definition for the SQLite backend.

/// Database schema definition.
pub(crate) const SCHEMA: &str = r"
-- Requirement catalog (display metadata and scope membership)
CREATE TABLE IF NOT EXISTS requirements (
    id TEXT PRIMARY KEY,
    scope TEXT NOT NULL,
    name TEXT NOT NULL,
    external_id TEXT,
    description TEXT
);

CREATE INDEX IF NOT EXISTS idx_requirements_scope ON requirements(scope);

-- Direct relationships
CREATE TABLE IF NOT EXISTS edges (
    ancestor_id TEXT NOT NULL,
    descendant_id TEXT NOT NULL,
    scope TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (ancestor_id, descendant_id),
    CHECK (ancestor_id <> descendant_id)
);

CREATE INDEX IF NOT EXISTS idx_edges_descendant ON edges(descendant_id);
CREATE INDEX IF NOT EXISTS idx_edges_scope ON edges(scope);

-- Transitive closure; depth is the shortest path length, 0 for self rows
CREATE TABLE IF NOT EXISTS closure (
    ancestor_id TEXT NOT NULL,
    descendant_id TEXT NOT NULL,
    depth INTEGER NOT NULL CHECK (depth >= 0),
    PRIMARY KEY (ancestor_id, descendant_id)
);

CREATE INDEX IF NOT EXISTS idx_closure_descendant ON closure(descendant_id, depth);
";

/// Per-connection scratch tables used while repairing the closure after a delete.
pub(crate) const SCRATCH: &str = r"
CREATE TEMP TABLE IF NOT EXISTS affected_ancestors (id TEXT PRIMARY KEY);
CREATE TEMP TABLE IF NOT EXISTS affected_descendants (id TEXT PRIMARY KEY);
";
