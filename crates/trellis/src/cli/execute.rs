//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands.

use anyhow::Result;
use std::collections::HashMap;

use super::args::{
    DragArgs, InfoArgs, InitArgs, LinkArgs, MoveArgs, RelatedArgs, ReqAction, ReqArgs, TreeArgs,
    UnlinkedArgs,
};
use crate::app::App;
use crate::domain::{Requirement, RequirementId};
use crate::drag::{DragDropReconciler, DragSource, DropOutcome, Point};
use crate::flatten::{CollapsedSet, collapse_all_to_top_level, flatten};
use crate::output::{self, Direction, OutputConfig, OutputMode};

/// Execute the init command
pub async fn execute_init(args: &InitArgs) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;

    if !args.quiet {
        println!(
            "Initializing trellis workspace{}...",
            args.project
                .as_ref()
                .map(|p| format!(" for project '{p}'"))
                .unwrap_or_default()
        );
    }

    let result = init::init(&current_dir, args.project.as_deref(), args.backend.as_deref()).await?;

    if !args.quiet {
        println!("Initialized trellis in {}", result.trellis_dir.display());
        println!("  Config:  {}", result.config_file.display());
        println!("  Backend: {}", result.backend);
        println!("  Default project: {}", result.project);
    }

    Ok(())
}

/// Execute the info command
pub async fn execute_info(app: &App, args: &InfoArgs, output_mode: OutputMode) -> Result<()> {
    let scope = app.scope(args.project.as_deref());
    let requirements = app.storage().list_requirements(&scope).await?;
    let edges = app.storage().list_edges(&scope).await?;
    let unlinked = app.queries().get_unlinked(&scope).await?;
    let storage = &app.config().storage;

    match output_mode {
        OutputMode::Json => {
            output::print_json(&serde_json::json!({
                "trellis_dir": app.trellis_dir().display().to_string(),
                "backend": storage.backend,
                "data_file": storage.data_file,
                "project": scope,
                "requirements": requirements.len(),
                "relationships": edges.len(),
                "unlinked": unlinked.len(),
            }))?;
        }
        OutputMode::Text => {
            println!("Trellis Workspace Information");
            println!("=============================");
            println!();
            println!("Directory: {}", app.trellis_dir().display());
            println!("Backend:   {} ({})", storage.backend, storage.data_file);
            println!("Project:   {scope}");
            println!();
            println!(
                "{} requirements, {} direct relationships, {} unlinked",
                requirements.len(),
                edges.len(),
                unlinked.len()
            );
        }
    }

    Ok(())
}

/// Execute the req command
pub async fn execute_req(app: &mut App, args: &ReqArgs, output_mode: OutputMode) -> Result<()> {
    match &args.action {
        ReqAction::Add {
            id,
            name,
            project,
            external_id,
            description,
        } => {
            let scope = app.scope(project.as_deref());
            let mut requirement = Requirement::new(id.as_str(), scope.0, name.as_str());
            requirement.external_id = external_id.clone();
            requirement.description = description.clone();

            app.relationships().register(requirement.clone()).await?;

            match output_mode {
                OutputMode::Json => output::print_json(&requirement)?,
                OutputMode::Text => {
                    let config = OutputConfig::from_env();
                    println!(
                        "{} requirement {} in project {}",
                        output::success("Registered", &config),
                        requirement.id,
                        requirement.scope
                    );
                }
            }
        }
        ReqAction::List { project } => {
            let scope = app.scope(project.as_deref());
            let requirements = app.storage().list_requirements(&scope).await?;
            output::print_requirements(&requirements, output_mode)?;
        }
        ReqAction::Show { id } => {
            let id = RequirementId::new(id.as_str());
            let requirement = app
                .storage()
                .get_requirement(&id)
                .await?
                .ok_or_else(|| crate::error::Error::RequirementNotFound(id.clone()))?;
            let queries = app.queries();
            let parents = queries.get_ancestors(&id, Some(1)).await?;
            let children = queries.get_descendants(&id, Some(1)).await?;
            output::print_requirement_details(&requirement, &parents, &children, output_mode)?;
        }
    }
    Ok(())
}

/// Execute the link command
pub async fn execute_link(app: &mut App, args: &LinkArgs, output_mode: OutputMode) -> Result<()> {
    let ancestor = RequirementId::new(args.ancestor.as_str());
    let descendant = RequirementId::new(args.descendant.as_str());

    let outcome = app.relationships().create(&ancestor, &descendant).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&outcome)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!(
                "{} {ancestor} -> {descendant} ({})",
                output::success("Linked", &config),
                outcome.message
            );
        }
    }
    Ok(())
}

/// Execute the unlink command
pub async fn execute_unlink(
    app: &mut App,
    args: &LinkArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let ancestor = RequirementId::new(args.ancestor.as_str());
    let descendant = RequirementId::new(args.descendant.as_str());

    let outcome = app.relationships().delete(&ancestor, &descendant).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&outcome)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!(
                "{} {ancestor} -> {descendant} ({})",
                output::success("Unlinked", &config),
                outcome.message
            );
        }
    }
    Ok(())
}

/// Execute the move command
pub async fn execute_move(app: &mut App, args: &MoveArgs, output_mode: OutputMode) -> Result<()> {
    let descendant = RequirementId::new(args.descendant.as_str());
    let new_parent = RequirementId::new(args.to.as_str());
    let old_parent = args.from.as_deref().map(RequirementId::new);

    let outcome = app
        .relationships()
        .relocate(old_parent.as_ref(), &new_parent, &descendant)
        .await?;

    match output_mode {
        OutputMode::Json => output::print_json(&outcome)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            println!(
                "{} ({} removed, {} added)",
                output::success(&outcome.message, &config),
                outcome.relationships_deleted,
                outcome.relationships_created
            );
        }
    }
    Ok(())
}

/// Execute the drag command.
///
/// Replays a complete press / move / hover / release gesture through the
/// reconciler, so the drop goes through the same checks and commit mode as
/// an interactive client.
pub async fn execute_drag(app: &mut App, args: &DragArgs, output_mode: OutputMode) -> Result<()> {
    let scope = app.scope(args.project.as_deref());
    let snapshot = app.queries().snapshot(&scope).await?;
    let drag_config = app.drag_config();

    let dragged = RequirementId::new(args.dragged.as_str());
    let source = match &args.from {
        Some(parent) => DragSource::Tree {
            parent: Some(RequirementId::new(parent.as_str())),
        },
        None => DragSource::Available,
    };

    let mut reconciler = DragDropReconciler::new(drag_config);
    reconciler.press(dragged, source, Point::new(0.0, 0.0))?;
    reconciler.pointer_moved(Point::new(drag_config.activation_distance + 1.0, 0.0));
    reconciler.hover(Some(RequirementId::new(args.onto.as_str())));

    let mut commands = app.relationships();
    let outcome = reconciler.release(&snapshot, &mut commands).await?;

    let config = OutputConfig::from_env();
    match (&outcome, output_mode) {
        (
            DropOutcome::Committed {
                dragged,
                target,
                relationships_deleted,
                relationships_created,
                ..
            },
            OutputMode::Json,
        ) => output::print_json(&serde_json::json!({
            "success": true,
            "dragged": dragged,
            "target": target,
            "relationshipsDeleted": relationships_deleted,
            "relationshipsCreated": relationships_created,
        }))?,
        (
            DropOutcome::Committed {
                dragged, target, ..
            },
            OutputMode::Text,
        ) => println!(
            "{} {dragged} under {target}",
            output::success("Moved", &config)
        ),
        (DropOutcome::Cancelled(reason), OutputMode::Json) => {
            output::print_json(&serde_json::json!({
                "success": false,
                "message": reason.message(),
            }))?
        }
        (DropOutcome::Cancelled(reason), OutputMode::Text) => {
            println!("{} {}", output::warning("Cancelled:", &config), reason)
        }
        (DropOutcome::Click(id), _) => {
            output::print_message(&format!("{id} was not moved"))?;
        }
    }
    Ok(())
}

/// Execute the ancestors / descendants commands
pub async fn execute_related(
    app: &App,
    args: &RelatedArgs,
    direction: Direction,
    output_mode: OutputMode,
) -> Result<()> {
    let id = RequirementId::new(args.id.as_str());
    let max_depth = args.max_depth.map(|d| d as usize);
    let queries = app.queries();

    let related = match direction {
        Direction::Up => queries.get_ancestors(&id, max_depth).await?,
        Direction::Down => queries.get_descendants(&id, max_depth).await?,
    };

    output::print_related(id.as_str(), &related, direction, output_mode)?;
    Ok(())
}

/// Execute the tree command
pub async fn execute_tree(app: &App, args: &TreeArgs, output_mode: OutputMode) -> Result<()> {
    let scope = app.scope(args.project.as_deref());
    let nodes = app.queries().get_tree(&scope).await?;

    let collapsed = if args.collapse_all {
        collapse_all_to_top_level(&nodes)
    } else {
        args.collapse
            .iter()
            .map(|id| RequirementId::new(id.as_str()))
            .collect::<CollapsedSet>()
    };
    let visible = flatten(&nodes, &collapsed);

    let titles: HashMap<String, String> = app
        .storage()
        .list_requirements(&scope)
        .await?
        .into_iter()
        .map(|r| {
            let title = r.title();
            (r.id.0, title)
        })
        .collect();

    output::print_tree(&visible, &titles, output_mode)?;
    Ok(())
}

/// Execute the unlinked command
pub async fn execute_unlinked(
    app: &App,
    args: &UnlinkedArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let scope = app.scope(args.project.as_deref());
    let unlinked = app.queries().get_unlinked(&scope).await?;
    output::print_requirements(&unlinked, output_mode)?;
    Ok(())
}
