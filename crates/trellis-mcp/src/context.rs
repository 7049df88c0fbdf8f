//! Workspace context management for the MCP server.
//!
//! This module handles:
//! - Workspace detection (walking up to find `.trellis/`)
//! - Path canonicalization
//! - Per-workspace storage instance management
//!
//! # Lock Ordering
//!
//! When using `Context` with `Tools`, locks must be acquired in this order:
//! 1. `Context` read/write lock (via `Arc<RwLock<Context>>`)
//! 2. Storage read/write lock (via `Arc<RwLock<Box<dyn TraceStorage>>>`)
//!
//! Never attempt to acquire a context lock while holding a storage lock.

use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use trellis::commands::init::{CONFIG_FILE_NAME, TRELLIS_DIR_NAME, TrellisConfig};
use trellis::storage::{TraceStorage, create_storage};

/// Maximum number of cached workspaces.
///
/// When this limit is reached, the oldest workspace is evicted from cache.
const MAX_CACHED_WORKSPACES: usize = 32;

/// Storage handle shared between tool calls.
pub type SharedStorage = Arc<RwLock<Box<dyn TraceStorage>>>;

/// Global context state for the MCP server.
///
/// Manages workspace contexts and storage instances for multi-workspace support.
pub struct Context {
    /// The current active workspace root.
    current_workspace: Option<PathBuf>,

    /// Per-workspace storage instances (limited to [`MAX_CACHED_WORKSPACES`]).
    storage_cache: HashMap<PathBuf, SharedStorage>,

    /// Per-workspace details loaded from `config.yaml`.
    workspaces: HashMap<PathBuf, WorkspaceInfo>,

    /// Insertion order for FIFO cache eviction.
    cache_order: VecDeque<PathBuf>,
}

impl Context {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_workspace: None,
            storage_cache: HashMap::new(),
            workspaces: HashMap::new(),
            cache_order: VecDeque::new(),
        }
    }

    /// Set the current workspace root.
    ///
    /// This will:
    /// 1. Canonicalize the path (resolves `..`, symlinks, validates existence)
    /// 2. Validate the path is safe (no null bytes, is absolute)
    /// 3. Verify a `.trellis/` directory exists
    /// 4. Create or retrieve a storage instance
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace path doesn't exist, has no `.trellis/`
    /// directory, its config cannot be read, or storage creation fails.
    pub async fn set_workspace(&mut self, workspace_root: &Path) -> Result<WorkspaceInfo> {
        debug!(path = %workspace_root.display(), "Setting workspace");

        let canonical = workspace_root
            .canonicalize()
            .map_err(|e| Error::WorkspaceNotFound {
                path: workspace_root.display().to_string(),
                source: e,
            })?;

        validate_path(&canonical)?;

        let trellis_dir = canonical.join(TRELLIS_DIR_NAME);
        if !trellis_dir.is_dir() {
            debug!(path = %trellis_dir.display(), "No .trellis directory found");
            return Err(Error::NoTrellisDirectory(canonical.display().to_string()));
        }

        let config_path = trellis_dir.join(CONFIG_FILE_NAME);
        let config = TrellisConfig::load(&config_path)
            .await
            .map_err(|source| Error::ConfigLoad {
                path: config_path.display().to_string(),
                source,
            })?;
        debug!(
            project = %config.default_project,
            backend = %config.storage.backend,
            "Loaded config"
        );

        let backend = config.storage.to_backend(&canonical)?;
        let info = WorkspaceInfo {
            workspace_root: canonical.clone(),
            database_path: backend.data_path().map(Path::to_path_buf),
            default_project: config.default_project.clone(),
        };

        self.current_workspace = Some(canonical.clone());
        self.workspaces.insert(canonical.clone(), info.clone());

        if self.storage_cache.contains_key(&canonical) {
            debug!("Using cached storage instance");
        } else {
            debug!("Creating new storage instance");
            while self.storage_cache.len() >= MAX_CACHED_WORKSPACES {
                self.evict_oldest();
            }

            let storage = create_storage(backend).await?;
            self.storage_cache
                .insert(canonical.clone(), Arc::new(RwLock::new(storage)));
            self.cache_order.push_back(canonical);
        }

        Ok(info)
    }

    /// Evict the oldest cached workspace to make room for new entries.
    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.cache_order.pop_front() {
            self.storage_cache.remove(&oldest);
            self.workspaces.remove(&oldest);
            if self.current_workspace.as_ref() == Some(&oldest) {
                self.current_workspace = None;
            }
            debug!(workspace = %oldest.display(), "Evicted workspace from cache");
        }
    }

    /// Get details of the current workspace.
    #[must_use]
    pub fn current_workspace(&self) -> Option<&WorkspaceInfo> {
        self.current_workspace
            .as_ref()
            .and_then(|ws| self.workspaces.get(ws))
    }

    /// Resolve the workspace a tool call targets.
    ///
    /// # Errors
    ///
    /// Returns `NoContext` if neither an explicit path nor a current workspace
    /// is available, `WorkspaceNotFound` if the path cannot be canonicalized,
    /// or `WorkspaceNotInitialized` if it was never passed to `set_workspace()`.
    pub fn workspace_for(&self, workspace_root: Option<&Path>) -> Result<&WorkspaceInfo> {
        let workspace = self.resolve(workspace_root)?;
        self.workspaces
            .get(&workspace)
            .ok_or_else(|| Error::WorkspaceNotInitialized(workspace.display().to_string()))
    }

    /// Get storage for a specific workspace, or the current one if not specified.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Context::workspace_for`].
    pub fn storage_for(&self, workspace_root: Option<&Path>) -> Result<SharedStorage> {
        let workspace = self.resolve(workspace_root)?;
        self.storage_cache
            .get(&workspace)
            .cloned()
            .ok_or_else(|| Error::WorkspaceNotInitialized(workspace.display().to_string()))
    }

    fn resolve(&self, workspace_root: Option<&Path>) -> Result<PathBuf> {
        match workspace_root {
            Some(path) => path.canonicalize().map_err(|e| Error::WorkspaceNotFound {
                path: path.display().to_string(),
                source: e,
            }),
            None => self.current_workspace.clone().ok_or(Error::NoContext),
        }
    }

    /// Discover and set the workspace by walking up from the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no `.trellis/` directory is found in the path
    /// hierarchy, or if storage creation fails.
    pub async fn discover_and_set_workspace(&mut self, start: &Path) -> Result<WorkspaceInfo> {
        let workspace_root = discover_workspace(start)?;
        self.set_workspace(&workspace_root).await
    }

    /// Register a workspace backed by injected storage, skipping config loading.
    #[cfg(test)]
    fn set_test_workspace(&mut self, workspace_root: PathBuf, storage: Box<dyn TraceStorage>) {
        self.current_workspace = Some(workspace_root.clone());
        self.workspaces.insert(
            workspace_root.clone(),
            WorkspaceInfo {
                workspace_root: workspace_root.clone(),
                database_path: None,
                default_project: "test".to_string(),
            },
        );
        self.storage_cache
            .insert(workspace_root.clone(), Arc::new(RwLock::new(storage)));
        self.cache_order.push_back(workspace_root);
    }

    #[cfg(test)]
    fn cache_size(&self) -> usize {
        self.storage_cache.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    /// The canonical path to the workspace root.
    pub workspace_root: PathBuf,

    /// The SQLite database file, `None` for in-memory workspaces.
    pub database_path: Option<PathBuf>,

    /// Project used when a tool call names none.
    pub default_project: String,
}

/// Validate that a path is safe to use as a workspace.
///
/// The path must be absolute, free of null bytes and free of `..`
/// components.
fn validate_path(path: &Path) -> Result<()> {
    let reason = if !path.is_absolute() {
        "must be absolute"
    } else if path.to_string_lossy().contains('\0') {
        "contains a null byte"
    } else if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        "contains parent directory references"
    } else {
        return Ok(());
    };

    Err(Error::InvalidWorkspacePath {
        path: path.to_path_buf(),
        reason,
    })
}

/// Discover a trellis workspace by walking up from the given directory.
///
/// Returns the canonicalized workspace root (directory containing `.trellis/`).
///
/// # Errors
///
/// Returns `Error::NoTrellisDirectory` if no `.trellis/` directory is found,
/// or `Error::WorkspaceNotFound` if the path cannot be canonicalized.
pub fn discover_workspace(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(TRELLIS_DIR_NAME).is_dir() {
            return current
                .canonicalize()
                .map_err(|e| Error::WorkspaceNotFound {
                    path: current.display().to_string(),
                    source: e,
                });
        }

        if !current.pop() {
            break;
        }
    }

    Err(Error::NoTrellisDirectory(start.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trellis::storage::in_memory::new_in_memory_storage;

    #[test]
    fn test_discover_workspace_from_nested_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(TRELLIS_DIR_NAME)).unwrap();
        let subdir = temp.path().join("docs").join("specs");
        std::fs::create_dir_all(&subdir).unwrap();

        let found = discover_workspace(&subdir).unwrap();
        assert_eq!(found, temp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_discover_workspace_not_found() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            discover_workspace(temp.path()),
            Err(Error::NoTrellisDirectory(_))
        ));
    }

    #[test]
    fn test_storage_for_without_context() {
        let context = Context::new();
        assert!(matches!(context.storage_for(None), Err(Error::NoContext)));
    }

    #[test]
    fn test_storage_for_uninitialized_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(TRELLIS_DIR_NAME)).unwrap();

        let context = Context::new();
        match context.storage_for(Some(temp.path())) {
            Err(Error::WorkspaceNotInitialized(_)) => {}
            Err(e) => panic!("Expected WorkspaceNotInitialized, got {e:?}"),
            Ok(_) => panic!("Expected error, got Ok"),
        }
    }

    #[test]
    fn test_storage_for_nonexistent_path() {
        let context = Context::new();
        let result = context.storage_for(Some(Path::new("/nonexistent/path/to/workspace")));
        assert!(matches!(result, Err(Error::WorkspaceNotFound { .. })));
    }

    #[test]
    fn test_validate_path() {
        assert!(matches!(
            validate_path(Path::new("relative/path")),
            Err(Error::InvalidWorkspacePath {
                reason: "must be absolute",
                ..
            })
        ));
        assert!(validate_path(&std::env::temp_dir()).is_ok());
    }

    #[tokio::test]
    async fn test_set_workspace_without_trellis_dir() {
        let temp = TempDir::new().unwrap();
        let mut context = Context::new();

        let err = context.set_workspace(temp.path()).await.unwrap_err();
        assert!(matches!(err, Error::NoTrellisDirectory(_)));
        assert!(context.current_workspace().is_none());
    }

    #[tokio::test]
    async fn test_set_workspace_with_broken_config() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(TRELLIS_DIR_NAME);
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), "storage: [").unwrap();

        let mut context = Context::new();
        let err = context.set_workspace(temp.path()).await.unwrap_err();
        assert!(matches!(err, Error::ConfigLoad { .. }));
    }

    #[test]
    fn test_evict_oldest_clears_current_workspace() {
        let mut context = Context::new();
        for i in 0..3 {
            let path = PathBuf::from(format!("/test/workspace{i}"));
            context.set_test_workspace(path, new_in_memory_storage());
        }
        assert_eq!(context.cache_size(), 3);

        context.evict_oldest();
        context.evict_oldest();
        assert_eq!(context.cache_size(), 1);
        assert!(context.current_workspace().is_some());

        // The remaining entry is the current workspace
        context.evict_oldest();
        assert_eq!(context.cache_size(), 0);
        assert!(context.current_workspace().is_none());

        context.evict_oldest();
        assert_eq!(context.cache_size(), 0);
    }
}
