//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for trellis using clap's derive API.
//! Each command has its own argument struct with validation and helpful error messages.
//!
//! # Commands
//!
//! - `init`: Initialize a new trellis workspace
//! - `req`: Register, list and show requirements
//! - `link` / `unlink`: Create or delete a direct relationship
//! - `move`: Re-parent a requirement atomically
//! - `drag`: Replay a drag-and-drop gesture through the reconciler
//! - `ancestors` / `descendants`: Closure queries
//! - `tree`: Render a project's hierarchy
//! - `unlinked`: Requirements not yet placed in the hierarchy
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! trellis req add SYS-1 --name "System shall log in users"
//! trellis req add SW-1 --name "Password form"
//! trellis link SYS-1 SW-1
//! trellis tree
//! trellis move SW-1 --from SYS-1 --to SYS-2
//! ```

mod args;
mod execute;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use args::{
    DragArgs, InfoArgs, InitArgs, LinkArgs, MoveArgs, RelatedArgs, ReqAction, ReqArgs, TreeArgs,
    UnlinkedArgs,
};

pub use validators::{
    validate_backend, validate_description, validate_name, validate_project,
    validate_requirement_id,
};

/// Trellis - requirement traceability from the command line
///
/// Link requirements into a parent/child hierarchy and query it. Relationships
/// are stored with their transitive closure in `.trellis/`.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new trellis workspace
    ///
    /// Creates the `.trellis/` directory with configuration and an empty
    /// relationship store.
    Init(InitArgs),

    /// Show workspace information
    Info(InfoArgs),

    /// Manage the requirement catalog
    Req(ReqArgs),

    /// Link a parent requirement to a child
    ///
    /// Rejected when it would create a cycle, duplicate an existing link or
    /// cross projects.
    Link(LinkArgs),

    /// Remove a direct link
    Unlink(LinkArgs),

    /// Move a requirement under a new parent in one atomic step
    Move(MoveArgs),

    /// Drop a requirement onto a new parent the way an interactive client would
    ///
    /// Uses the configured commit mode, so a two-step commit can report a
    /// partially applied move.
    Drag(DragArgs),

    /// List every ancestor of a requirement, nearest first
    Ancestors(RelatedArgs),

    /// List every descendant of a requirement, nearest first
    Descendants(RelatedArgs),

    /// Render a project's hierarchy
    Tree(TreeArgs),

    /// List requirements that are not linked to anything
    Unlinked(UnlinkedArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::{Direction, OutputMode};

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        match &self.command {
            Some(Commands::Init(args)) => execute::execute_init(args).await,
            Some(Commands::Info(args)) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_info(&app, args, output_mode).await
            }
            Some(Commands::Req(args)) => {
                let mut app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_req(&mut app, args, output_mode).await
            }
            Some(Commands::Link(args)) => {
                let mut app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_link(&mut app, args, output_mode).await
            }
            Some(Commands::Unlink(args)) => {
                let mut app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_unlink(&mut app, args, output_mode).await
            }
            Some(Commands::Move(args)) => {
                let mut app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_move(&mut app, args, output_mode).await
            }
            Some(Commands::Drag(args)) => {
                let mut app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_drag(&mut app, args, output_mode).await
            }
            Some(Commands::Ancestors(args)) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_related(&app, args, Direction::Up, output_mode).await
            }
            Some(Commands::Descendants(args)) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_related(&app, args, Direction::Down, output_mode).await
            }
            Some(Commands::Tree(args)) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_tree(&app, args, output_mode).await
            }
            Some(Commands::Unlinked(args)) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_unlinked(&app, args, output_mode).await
            }
            None => {
                println!("Trellis requirement traceability");
                println!("Use --help for more information");
                Ok(())
            }
        }
    }
}
