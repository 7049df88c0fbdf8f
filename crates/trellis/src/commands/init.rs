//! Implementation of the `init` command and the workspace configuration file.
//!
//! `trellis init` creates a `.trellis/` directory holding `config.yaml` and,
//! for the SQLite backend, the database file.

use crate::drag::{CommitMode, DEFAULT_ACTIVATION_DISTANCE, DragConfig};
use crate::domain::validate_id;
use crate::error::{Error, Result};
use crate::storage::{DEFAULT_BUSY_TIMEOUT_MS, StorageBackend};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Default project scope if none specified
pub const DEFAULT_PROJECT: &str = "default";

/// Name of the trellis directory
pub const TRELLIS_DIR_NAME: &str = ".trellis";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the SQLite database file
pub const DATABASE_FILE_NAME: &str = "trellis.db";

/// Name of the gitignore file within .trellis
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

/// Maximum directory depth to traverse when searching for the trellis root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Backend name for in-memory storage
pub const BACKEND_MEMORY: &str = "memory";

/// Backend name for SQLite storage
pub const BACKEND_SQLITE: &str = "sqlite";

/// Configuration file structure for trellis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrellisConfig {
    /// Project scope used when a command does not name one
    #[serde(rename = "default-project")]
    pub default_project: String,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Drag-and-drop settings
    #[serde(default)]
    pub drag: DragSettings,
}

/// Storage configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Storage backend type (`memory` or `sqlite`)
    pub backend: String,

    /// Path to the data file, relative to the workspace root
    pub data_file: String,

    /// Milliseconds a SQLite writer waits for the database lock
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Drag-and-drop section
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DragSettings {
    /// Pointer travel in pixels before a press becomes a drag
    #[serde(default = "default_activation_distance")]
    pub activation_distance: f64,

    /// How drops are written (`two-step` or `atomic`)
    #[serde(default)]
    pub commit_mode: CommitMode,
}

fn default_activation_distance() -> f64 {
    DEFAULT_ACTIVATION_DISTANCE
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            activation_distance: DEFAULT_ACTIVATION_DISTANCE,
            commit_mode: CommitMode::default(),
        }
    }
}

impl From<DragSettings> for DragConfig {
    fn from(settings: DragSettings) -> Self {
        DragConfig {
            activation_distance: settings.activation_distance,
            commit_mode: settings.commit_mode,
        }
    }
}

impl StorageConfig {
    /// Resolve this section into a storage backend rooted at `root_dir`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unknown backend name or a data file that
    /// escapes the workspace.
    pub fn to_backend(&self, root_dir: &Path) -> Result<StorageBackend> {
        match self.backend.as_str() {
            BACKEND_MEMORY => Ok(StorageBackend::InMemory),
            BACKEND_SQLITE => {
                let relative = Path::new(&self.data_file);
                if relative.is_absolute()
                    || relative.components().any(|c| matches!(c, Component::ParentDir))
                {
                    return Err(Error::Config(format!(
                        "data_file must be a path inside the workspace, got '{}'",
                        self.data_file
                    )));
                }
                Ok(StorageBackend::Sqlite {
                    path: root_dir.join(relative),
                    busy_timeout_ms: self.busy_timeout_ms,
                })
            }
            other => Err(Error::Config(format!(
                "Unknown storage backend '{other}' (expected '{BACKEND_MEMORY}' or '{BACKEND_SQLITE}')"
            ))),
        }
    }
}

impl TrellisConfig {
    /// Create a new configuration for the given project and backend
    pub fn new(project: &str, backend: &str) -> Self {
        Self {
            default_project: project.to_string(),
            storage: StorageConfig {
                backend: backend.to_string(),
                data_file: format!("{TRELLIS_DIR_NAME}/{DATABASE_FILE_NAME}"),
                busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            },
            drag: DragSettings::default(),
        }
    }

    /// Load configuration from a file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }
}

impl Default for TrellisConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT, BACKEND_SQLITE)
    }
}

/// Result of the init command
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created trellis directory
    pub trellis_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the created gitignore file
    pub gitignore_file: PathBuf,
    /// The default project scope
    pub project: String,
    /// The configured backend name
    pub backend: String,
}

/// Initialize a new trellis workspace in the given directory.
///
/// # Errors
///
/// Returns an error if:
/// - The `.trellis/` directory already exists
/// - The project name or backend is invalid
/// - File system operations fail
pub async fn init(
    base_dir: &Path,
    project: Option<&str>,
    backend: Option<&str>,
) -> Result<InitResult> {
    let project = project.unwrap_or(DEFAULT_PROJECT).trim();
    validate_id(project).map_err(|e| Error::Config(format!("Invalid project name: {e}")))?;

    let backend = backend.unwrap_or(BACKEND_SQLITE).trim();
    if backend != BACKEND_MEMORY && backend != BACKEND_SQLITE {
        return Err(Error::Config(format!(
            "Unknown storage backend '{backend}' (expected '{BACKEND_MEMORY}' or '{BACKEND_SQLITE}')"
        )));
    }

    let trellis_dir = base_dir.join(TRELLIS_DIR_NAME);

    if trellis_dir.exists() {
        return Err(Error::Config(format!(
            "Trellis is already initialized in this directory. Found existing '{TRELLIS_DIR_NAME}'"
        )));
    }

    fs::create_dir_all(&trellis_dir).await?;

    let config_file = trellis_dir.join(CONFIG_FILE_NAME);
    let config = TrellisConfig::new(project, backend);
    config.save(&config_file).await?;

    let gitignore_file = trellis_dir.join(GITIGNORE_FILE_NAME);
    let gitignore_content = "\
# Trellis SQLite sidecar files
trellis.db-wal
trellis.db-shm
";
    fs::write(&gitignore_file, gitignore_content).await?;

    tracing::info!(dir = %trellis_dir.display(), project, backend, "Initialized trellis workspace");

    Ok(InitResult {
        trellis_dir,
        config_file,
        gitignore_file,
        project: project.to_string(),
        backend: backend.to_string(),
    })
}

/// Check if a directory has been initialized with trellis.
pub fn is_initialized(base_dir: &Path) -> bool {
    base_dir.join(TRELLIS_DIR_NAME).exists()
}

/// Find the trellis root directory by searching up the directory tree.
///
/// Returns `Some(path)` with the directory containing `.trellis/`,
/// or `None` if none is found within [`MAX_TRAVERSAL_DEPTH`] levels.
pub fn find_trellis_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(TRELLIS_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    // ========== TrellisConfig Tests ==========

    #[test]
    fn test_config_default() {
        let config = TrellisConfig::default();
        assert_eq!(config.default_project, DEFAULT_PROJECT);
        assert_eq!(config.storage.backend, BACKEND_SQLITE);
        assert_eq!(config.storage.data_file, ".trellis/trellis.db");
        assert!((config.drag.activation_distance - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.drag.commit_mode, CommitMode::TwoStep);
    }

    #[tokio::test]
    async fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let original = TrellisConfig::new("portal", BACKEND_MEMORY);
        original.save(&config_path).await.unwrap();

        let loaded = TrellisConfig::load(&config_path).await.unwrap();
        assert_eq!(original, loaded);
    }

    #[tokio::test]
    async fn test_config_yaml_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        TrellisConfig::new("portal", BACKEND_SQLITE)
            .save(&config_path)
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&config_path).await.unwrap();
        assert!(content.contains("default-project: portal"));
        assert!(content.contains("backend: sqlite"));
        assert!(content.contains("data_file: .trellis/trellis.db"));
        assert!(content.contains("commit_mode: two-step"));
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = "default-project: p\nstorage:\n  backend: memory\n  data_file: x.db\n";
        let config: TrellisConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.storage.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(config.drag, DragSettings::default());
    }

    #[test]
    fn test_atomic_commit_mode_parses() {
        let yaml = "default-project: p\nstorage:\n  backend: memory\n  data_file: x.db\ndrag:\n  commit_mode: atomic\n";
        let config: TrellisConfig = serde_yaml::from_str(yaml).unwrap();
        let drag: DragConfig = config.drag.into();
        assert_eq!(drag.commit_mode, CommitMode::Atomic);
    }

    // ========== Backend Resolution Tests ==========

    #[test]
    fn test_sqlite_backend_resolves_under_root() {
        let config = TrellisConfig::default();
        let backend = config.storage.to_backend(Path::new("/work")).unwrap();
        assert_eq!(
            backend,
            StorageBackend::Sqlite {
                path: PathBuf::from("/work/.trellis/trellis.db"),
                busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            }
        );
    }

    #[rstest]
    #[case::parent_dir("../outside.db")]
    #[case::absolute("/etc/trellis.db")]
    fn test_data_file_must_stay_in_workspace(#[case] data_file: &str) {
        let mut config = TrellisConfig::default();
        config.storage.data_file = data_file.to_string();
        assert!(config.storage.to_backend(Path::new("/work")).is_err());
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let mut config = TrellisConfig::default();
        config.storage.backend = "postgres".to_string();
        let err = config.storage.to_backend(Path::new("/work")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    // ========== Init Command Tests ==========

    #[tokio::test]
    async fn test_init_creates_directory_structure() {
        let temp_dir = TempDir::new().unwrap();

        let result = init(temp_dir.path(), None, None).await.unwrap();

        assert!(result.trellis_dir.exists());
        assert!(result.config_file.exists());
        assert!(result.gitignore_file.exists());
        assert_eq!(result.project, DEFAULT_PROJECT);
        assert_eq!(result.backend, BACKEND_SQLITE);
    }

    #[tokio::test]
    async fn test_init_with_custom_project_and_backend() {
        let temp_dir = TempDir::new().unwrap();

        let result = init(temp_dir.path(), Some("portal"), Some("memory"))
            .await
            .unwrap();

        let config = TrellisConfig::load(&result.config_file).await.unwrap();
        assert_eq!(config.default_project, "portal");
        assert_eq!(config.storage.backend, BACKEND_MEMORY);
    }

    #[tokio::test]
    async fn test_init_fails_if_already_initialized() {
        let temp_dir = TempDir::new().unwrap();

        init(temp_dir.path(), None, None).await.unwrap();

        let err = init(temp_dir.path(), None, None).await.unwrap_err();
        assert!(err.to_string().to_lowercase().contains("already initialized"));
    }

    #[rstest]
    #[case::bad_project(Some("has space"), None)]
    #[case::bad_backend(None, Some("postgres"))]
    #[tokio::test]
    async fn test_init_rejects_invalid_input(
        #[case] project: Option<&str>,
        #[case] backend: Option<&str>,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let result = init(temp_dir.path(), project, backend).await;
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(!is_initialized(temp_dir.path()));
    }

    // ========== Utility Function Tests ==========

    #[test]
    fn test_find_trellis_root_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(TRELLIS_DIR_NAME)).unwrap();

        let sub_dir = temp_dir.path().join("sub").join("nested");
        std::fs::create_dir_all(&sub_dir).unwrap();

        let found = find_trellis_root(&sub_dir);
        assert_eq!(found, Some(temp_dir.path().to_path_buf()));
    }

    #[test]
    fn test_find_trellis_root_not_found() {
        let temp_dir = TempDir::new().unwrap();
        assert!(find_trellis_root(temp_dir.path()).is_none());
    }
}
