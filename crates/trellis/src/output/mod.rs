//! Output formatting for CLI commands.
//!
//! Every printer has a text form for people and a JSON form for scripts.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers
//! - [`tree`]: Hierarchy rendering with ASCII/Unicode connectors

pub mod color;
pub mod tree;

use crate::domain::{RelatedRequirement, Requirement, TreeNode};
use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::io::{self, Write};

pub use color::{success, warning};

use color::{bold, colorize_id, dimmed, down_arrow, up_arrow};

// ============================================================================
// Output Configuration
// ============================================================================

const DEFAULT_TERMINAL_WIDTH: u16 = 80;
const DEFAULT_MAX_CONTENT_WIDTH: usize = 80;

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Maximum content width for text wrapping.
    pub max_width: usize,
    /// Whether to use ASCII-only icons instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new OutputConfig with explicit values.
    pub fn new(max_width: usize, use_ascii: bool, use_colors: bool) -> Self {
        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }

    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `TRELLIS_MAX_WIDTH`: Maximum content width (default: 80)
    /// - `TRELLIS_ASCII`: Set to "1" or "true" for ASCII-only icons (default: false)
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `TRELLIS_COLOR`: Set to "0" or "false" to disable colors (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_width = match lookup("TRELLIS_MAX_WIDTH") {
            Some(s) if !s.is_empty() => match s.parse() {
                Ok(width) => width,
                Err(_) => {
                    tracing::warn!(
                        env_var = "TRELLIS_MAX_WIDTH",
                        value = %s,
                        default = DEFAULT_MAX_CONTENT_WIDTH,
                        "Invalid value, using default"
                    );
                    DEFAULT_MAX_CONTENT_WIDTH
                }
            },
            _ => DEFAULT_MAX_CONTENT_WIDTH,
        };

        let use_ascii = match lookup("TRELLIS_ASCII") {
            Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Some(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.is_empty() => false,
            Some(v) => {
                tracing::warn!(
                    env_var = "TRELLIS_ASCII",
                    value = %v,
                    "Invalid value (expected '1', 'true', '0', or 'false'), using default"
                );
                false
            }
            None => false,
        };

        // https://no-color.org/
        let use_colors = lookup("NO_COLOR").is_none()
            && lookup("TRELLIS_COLOR").is_none_or(|v| v != "0" && !v.eq_ignore_ascii_case("false"));

        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_CONTENT_WIDTH,
            use_ascii: false,
            use_colors: true,
        }
    }
}

/// Get the current terminal width, falling back to default if detection fails.
fn get_terminal_width() -> usize {
    terminal_size::terminal_size()
        .map_or(usize::from(DEFAULT_TERMINAL_WIDTH), |(w, _)| usize::from(w.0))
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Which way a related-requirements listing points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Listing ancestors
    Up,
    /// Listing descendants
    Down,
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Print a list of requirements
pub fn print_requirements(requirements: &[Requirement], mode: OutputMode) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env();

    match mode {
        OutputMode::Text => print_requirements_text(&mut handle, requirements, &config),
        OutputMode::Json => write_json(&mut handle, &requirements),
    }
}

/// Print a requirement with its direct parents and children
pub fn print_requirement_details(
    requirement: &Requirement,
    parents: &[RelatedRequirement],
    children: &[RelatedRequirement],
    mode: OutputMode,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env();

    match mode {
        OutputMode::Text => {
            print_requirement_details_text(&mut handle, requirement, parents, children, &config)
        }
        OutputMode::Json => write_json(
            &mut handle,
            &serde_json::json!({
                "requirement": requirement,
                "parents": parents,
                "children": children,
            }),
        ),
    }
}

/// Print ancestors or descendants of a requirement
pub fn print_related(
    subject: &str,
    related: &[RelatedRequirement],
    direction: Direction,
    mode: OutputMode,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env();

    match mode {
        OutputMode::Text => print_related_text(&mut handle, subject, related, direction, &config),
        OutputMode::Json => write_json(&mut handle, &serde_json::json!({ "data": related })),
    }
}

/// Print the visible rows of a scope's tree
pub fn print_tree(
    rows: &[&TreeNode],
    titles: &HashMap<String, String>,
    mode: OutputMode,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let config = OutputConfig::from_env();

    match mode {
        OutputMode::Text => tree::print_tree_text(&mut handle, rows, titles, &config),
        OutputMode::Json => write_json(&mut handle, &serde_json::json!({ "data": rows })),
    }
}

/// Print a simple message
pub fn print_message(msg: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{msg}")
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, value)
}

fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(w, "{json}")
}

// ============================================================================
// Text Formatting
// ============================================================================

fn print_requirements_text<W: Write>(
    w: &mut W,
    requirements: &[Requirement],
    config: &OutputConfig,
) -> io::Result<()> {
    if requirements.is_empty() {
        writeln!(w, "No requirements found.")?;
        return Ok(());
    }

    writeln!(w, "Found {} requirement(s):", requirements.len())?;
    writeln!(w)?;

    for requirement in requirements {
        writeln!(
            w,
            "{}  {}",
            colorize_id(requirement.id.as_str(), config),
            requirement.title()
        )?;
    }

    Ok(())
}

fn print_requirement_details_text<W: Write>(
    w: &mut W,
    requirement: &Requirement,
    parents: &[RelatedRequirement],
    children: &[RelatedRequirement],
    config: &OutputConfig,
) -> io::Result<()> {
    let content_width = get_terminal_width().min(config.max_width);

    writeln!(
        w,
        "{}: {}",
        colorize_id(requirement.id.as_str(), config),
        requirement.name
    )?;
    writeln!(w, "{} {}", dimmed("Project:", config), requirement.scope)?;
    if let Some(ext) = &requirement.external_id {
        writeln!(w, "{} {}", dimmed("External ID:", config), ext)?;
    }

    if let Some(description) = requirement.description.as_deref().filter(|d| !d.is_empty()) {
        writeln!(w)?;
        writeln!(w, "{}:", bold("Description", config))?;
        for line in wrap_text(description, content_width.saturating_sub(2)) {
            writeln!(w, "  {line}")?;
        }
    }

    for (title, rows, arrow) in [
        ("Parents", parents, up_arrow(config)),
        ("Children", children, down_arrow(config)),
    ] {
        if rows.is_empty() {
            continue;
        }
        writeln!(w)?;
        writeln!(w, "{} ({}):", bold(title, config), rows.len())?;
        for row in rows {
            writeln!(
                w,
                "  {} {} {}",
                dimmed(arrow, config),
                colorize_id(row.requirement_id.as_str(), config),
                row.title
            )?;
        }
    }

    Ok(())
}

fn print_related_text<W: Write>(
    w: &mut W,
    subject: &str,
    related: &[RelatedRequirement],
    direction: Direction,
    config: &OutputConfig,
) -> io::Result<()> {
    let (noun, arrow) = match direction {
        Direction::Up => ("ancestors", up_arrow(config)),
        Direction::Down => ("descendants", down_arrow(config)),
    };

    if related.is_empty() {
        writeln!(w, "{subject} has no {noun}.")?;
        return Ok(());
    }

    writeln!(
        w,
        "{} {} of {}:",
        related.len(),
        noun,
        colorize_id(subject, config)
    )?;
    for row in related {
        let marker = if row.direct_parent { arrow } else { " " };
        writeln!(
            w,
            "  {} {} {} {}",
            marker,
            dimmed(&format!("[{}]", row.depth), config),
            colorize_id(row.requirement_id.as_str(), config),
            row.title
        )?;
    }
    Ok(())
}

/// Wrap text to fit within a given width, preserving existing line breaks.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            if line.trim().is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(line, max_width.max(1))
                    .into_iter()
                    .map(std::borrow::Cow::into_owned)
                    .collect()
            }
        })
        .collect()
}
