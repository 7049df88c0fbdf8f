//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::{Parser, Subcommand};

use super::validators::{
    validate_backend, validate_description, validate_name, validate_project,
    validate_requirement_id,
};

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Default project for commands that take `--project`
    #[arg(short, long, value_parser = validate_project)]
    pub project: Option<String>,

    /// Storage backend: `sqlite` (default) or `memory`
    #[arg(short, long, value_parser = validate_backend)]
    pub backend: Option<String>,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {
    /// Project to summarize (defaults to the configured project)
    #[arg(short, long, value_parser = validate_project)]
    pub project: Option<String>,
}

/// Arguments for the `req` command
#[derive(Parser, Debug, Clone)]
pub struct ReqArgs {
    /// Catalog action to perform
    #[command(subcommand)]
    pub action: ReqAction,
}

/// Requirement catalog actions
#[derive(Subcommand, Debug, Clone)]
pub enum ReqAction {
    /// Register or update a requirement
    Add {
        /// Requirement ID
        #[arg(value_parser = validate_requirement_id)]
        id: String,

        /// Display name
        #[arg(short, long, value_parser = validate_name)]
        name: String,

        /// Project the requirement belongs to
        #[arg(short, long, value_parser = validate_project)]
        project: Option<String>,

        /// External reference such as a document section number
        #[arg(short = 'x', long)]
        external_id: Option<String>,

        /// Longer description
        #[arg(short = 'D', long, value_parser = validate_description)]
        description: Option<String>,
    },

    /// List the requirements of a project
    List {
        /// Project to list
        #[arg(short, long, value_parser = validate_project)]
        project: Option<String>,
    },

    /// Show a requirement with its direct parents and children
    Show {
        /// Requirement ID
        #[arg(value_parser = validate_requirement_id)]
        id: String,
    },
}

/// Arguments for the `link` and `unlink` commands
#[derive(Parser, Debug, Clone)]
pub struct LinkArgs {
    /// Parent end of the relationship
    #[arg(value_parser = validate_requirement_id)]
    pub ancestor: String,

    /// Child end of the relationship
    #[arg(value_parser = validate_requirement_id)]
    pub descendant: String,
}

/// Arguments for the `move` command
#[derive(Parser, Debug, Clone)]
pub struct MoveArgs {
    /// Requirement to re-parent
    #[arg(value_parser = validate_requirement_id)]
    pub descendant: String,

    /// New parent
    #[arg(short, long = "to", value_parser = validate_requirement_id)]
    pub to: String,

    /// Current parent to detach from; omit to only add the new link
    #[arg(short, long = "from", value_parser = validate_requirement_id)]
    pub from: Option<String>,
}

/// Arguments for the `drag` command
#[derive(Parser, Debug, Clone)]
pub struct DragArgs {
    /// Requirement being dragged
    #[arg(value_parser = validate_requirement_id)]
    pub dragged: String,

    /// Requirement it is dropped onto
    #[arg(short, long, value_parser = validate_requirement_id)]
    pub onto: String,

    /// Parent it is currently rendered under; omit when dragging from the
    /// unlinked list
    #[arg(short, long = "from", value_parser = validate_requirement_id)]
    pub from: Option<String>,

    /// Project whose graph the drop is validated against
    #[arg(short, long, value_parser = validate_project)]
    pub project: Option<String>,
}

/// Arguments for the `ancestors` and `descendants` commands
#[derive(Parser, Debug, Clone)]
pub struct RelatedArgs {
    /// Requirement ID
    #[arg(value_parser = validate_requirement_id)]
    pub id: String,

    /// Only include rows up to this distance
    #[arg(short = 'd', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_depth: Option<u32>,
}

/// Arguments for the `tree` command
#[derive(Parser, Debug, Clone)]
pub struct TreeArgs {
    /// Project to render
    #[arg(short, long, value_parser = validate_project)]
    pub project: Option<String>,

    /// Collapse every root so only the top level shows
    #[arg(long, conflicts_with = "collapse")]
    pub collapse_all: bool,

    /// Collapse the subtree under these requirements (comma-separated)
    #[arg(short, long, value_delimiter = ',', value_parser = validate_requirement_id)]
    pub collapse: Vec<String>,
}

/// Arguments for the `unlinked` command
#[derive(Parser, Debug, Clone)]
pub struct UnlinkedArgs {
    /// Project to inspect
    #[arg(short, long, value_parser = validate_project)]
    pub project: Option<String>,
}
