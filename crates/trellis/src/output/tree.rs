//! Hierarchy rendering for `trellis tree` output.

use std::collections::HashMap;
use std::io::{self, Write};

use colored::Colorize;

use super::OutputConfig;
use super::color::{colorize_id, dimmed};
use crate::domain::{PATH_SEPARATOR, TreeNode};

/// Render path-sorted tree rows with ASCII/Unicode connectors.
///
/// ```text
/// ◆ SYS-1 System shall log in users
/// ├── SW-1 Password form
/// │   └── SW-3 Hashing
/// └── SW-2 Session handling [+]
/// ```
///
/// `titles` maps ids to display titles; rows without an entry show the id
/// only. Rows whose children are hidden (collapsed) get a `[+]` marker.
pub fn print_tree_text<W: Write>(
    w: &mut W,
    rows: &[&TreeNode],
    titles: &HashMap<String, String>,
    config: &OutputConfig,
) -> io::Result<()> {
    if rows.is_empty() {
        writeln!(w, "No relationships found.")?;
        return Ok(());
    }

    // parent path -> child row indexes, in input order
    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match row.path.rsplit_once(PATH_SEPARATOR) {
            Some((parent_path, _)) => children.entry(parent_path).or_default().push(index),
            None => roots.push(index),
        }
    }

    let root_icon = if config.use_ascii { "*" } else { "◆" };
    let root_icon = if config.use_colors {
        root_icon.cyan().bold().to_string()
    } else {
        root_icon.to_string()
    };

    for &root in &roots {
        let row = rows[root];
        writeln!(w, "{} {}", root_icon, label(row, titles, &children, config))?;
        print_children(w, rows, &children, root, &mut Vec::new(), titles, config)?;
    }

    Ok(())
}

fn label(
    row: &TreeNode,
    titles: &HashMap<String, String>,
    children: &HashMap<&str, Vec<usize>>,
    config: &OutputConfig,
) -> String {
    let mut text = colorize_id(row.requirement_id.as_str(), config);
    if let Some(title) = titles.get(row.requirement_id.as_str()) {
        text.push(' ');
        text.push_str(title);
    }
    if row.has_children && !children.contains_key(row.path.as_str()) {
        text.push(' ');
        text.push_str(&dimmed("[+]", config));
    }
    text
}

/// `open_levels` records, per ancestor level, whether more siblings follow
/// and a vertical continuation line must be drawn.
fn print_children<W: Write>(
    w: &mut W,
    rows: &[&TreeNode],
    children: &HashMap<&str, Vec<usize>>,
    parent: usize,
    open_levels: &mut Vec<bool>,
    titles: &HashMap<String, String>,
    config: &OutputConfig,
) -> io::Result<()> {
    let Some(kids) = children.get(rows[parent].path.as_str()) else {
        return Ok(());
    };

    let (branch, corner, pipe, space) = if config.use_ascii {
        ("|-- ", "`-- ", "|   ", "    ")
    } else {
        ("├── ", "└── ", "│   ", "    ")
    };

    for (i, &kid) in kids.iter().enumerate() {
        let is_last = i == kids.len() - 1;

        let mut prefix = String::new();
        for &has_more in open_levels.iter() {
            prefix.push_str(if has_more { pipe } else { space });
        }
        prefix.push_str(if is_last { corner } else { branch });

        writeln!(
            w,
            "{}{}",
            dimmed(&prefix, config),
            label(rows[kid], titles, children, config)
        )?;

        open_levels.push(!is_last);
        print_children(w, rows, children, kid, open_levels, titles, config)?;
        open_levels.pop();
    }

    Ok(())
}
