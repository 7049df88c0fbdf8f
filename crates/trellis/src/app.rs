//! Application context for CLI command execution.
//!
//! # Example
//!
//! ```no_run
//! use trellis::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_directory(Path::new(".")).await?;
//!     println!("default project: {}", app.default_project());
//!     Ok(())
//! }
//! ```

use crate::commands::init::{
    CONFIG_FILE_NAME, TRELLIS_DIR_NAME, TrellisConfig, find_trellis_root,
};
use crate::domain::ScopeId;
use crate::drag::DragConfig;
use crate::error::{Error, Result};
use crate::query::TreeQueryService;
use crate::service::RelationshipService;
use crate::storage::{TraceStorage, create_storage};
use std::path::{Path, PathBuf};

/// Application context for CLI operations.
///
/// Locates the workspace, loads its configuration and opens the configured
/// storage backend.
pub struct App {
    /// The storage backend (trait object for polymorphism)
    storage: Box<dyn TraceStorage>,

    /// Path to the trellis directory (.trellis)
    trellis_dir: PathBuf,

    /// Loaded workspace configuration
    config: TrellisConfig,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("trellis_dir", &self.trellis_dir)
            .field("config", &self.config)
            .field("storage", &"<dyn TraceStorage>")
            .finish()
    }
}

impl App {
    /// Create an App instance from the given working directory.
    ///
    /// Searches up the directory tree to find a `.trellis/` directory,
    /// loads configuration, and opens storage.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No trellis workspace is found in the directory tree
    /// - Configuration cannot be loaded
    /// - Storage initialization fails
    pub async fn from_directory(working_dir: &Path) -> Result<Self> {
        let root_dir = find_trellis_root(working_dir).ok_or_else(|| {
            Error::Config(
                "Not a trellis workspace (or any parent directory). Run 'trellis init' first."
                    .to_string(),
            )
        })?;

        let trellis_dir = root_dir.join(TRELLIS_DIR_NAME);
        let config = TrellisConfig::load(&trellis_dir.join(CONFIG_FILE_NAME)).await?;

        let backend = config.storage.to_backend(&root_dir)?;
        tracing::debug!(?backend, project = %config.default_project, "Opening workspace");
        let storage = create_storage(backend).await?;

        Ok(Self {
            storage,
            trellis_dir,
            config,
        })
    }

    /// Get an immutable reference to the storage.
    pub fn storage(&self) -> &dyn TraceStorage {
        self.storage.as_ref()
    }

    /// Validated mutations against this workspace.
    pub fn relationships(&mut self) -> RelationshipService<'_, dyn TraceStorage> {
        RelationshipService::new(self.storage.as_mut())
    }

    /// Read-side queries against this workspace.
    pub fn queries(&self) -> TreeQueryService<'_, dyn TraceStorage> {
        TreeQueryService::new(self.storage.as_ref())
    }

    /// Resolve an optional project argument against the configured default.
    pub fn scope(&self, project: Option<&str>) -> ScopeId {
        ScopeId::new(project.unwrap_or(&self.config.default_project))
    }

    /// Default project scope from configuration.
    pub fn default_project(&self) -> &str {
        &self.config.default_project
    }

    /// Loaded configuration.
    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }

    /// Drag-and-drop settings from configuration.
    pub fn drag_config(&self) -> DragConfig {
        self.config.drag.into()
    }

    /// Get the path to the trellis directory.
    pub fn trellis_dir(&self) -> &Path {
        &self.trellis_dir
    }
}
