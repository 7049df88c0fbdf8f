//! Drag-and-drop re-parenting.
//!
//! [`DragDropReconciler`] turns pointer events into relationship mutations:
//!
//! ```text
//! Idle -> Pressed -> Dragging -> Targeting -> Committing -> Idle
//!                        \            \
//!                         `------------`--> (cancelled) -> Idle
//! ```
//!
//! Nothing touches storage until a drop passes every check. Cancellation before
//! that point has no side effects. A commit is either two awaited calls
//! (delete the old parent edge, then create the new one) or one atomic move,
//! depending on [`CommitMode`].

use crate::domain::RequirementId;
use crate::error::{Error, Result};
use crate::query::ClosureSnapshot;
use crate::service::RelationshipCommands;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default pointer travel, in pixels, before a press turns into a drag.
pub const DEFAULT_ACTIVATION_DISTANCE: f64 = 5.0;

/// A pointer position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Where the dragged requirement was picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragSource {
    /// A row of the rendered tree, with the parent it is rendered under.
    Tree {
        /// Rendered parent, `None` for a root
        parent: Option<RequirementId>,
    },
    /// The panel of requirements that are not linked yet.
    Available,
}

impl DragSource {
    fn old_parent(&self) -> Option<&RequirementId> {
        match self {
            DragSource::Tree { parent } => parent.as_ref(),
            DragSource::Available => None,
        }
    }
}

/// How a validated drop is written to storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitMode {
    /// Delete the old parent edge, then create the new one. A failure between
    /// the two steps surfaces as [`Error::PartialMove`].
    #[default]
    TwoStep,
    /// One atomic move; either both halves apply or neither does.
    Atomic,
}

/// Reconciler settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragConfig {
    /// Pointer travel required before a press becomes a drag
    pub activation_distance: f64,
    /// Commit strategy
    pub commit_mode: CommitMode,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            activation_distance: DEFAULT_ACTIVATION_DISTANCE,
            commit_mode: CommitMode::default(),
        }
    }
}

/// Current state of the gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragPhase {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Pointer is down but has not travelled far enough yet.
    Pressed {
        /// Requirement under the pointer
        dragged: RequirementId,
        /// Where it was picked up
        source: DragSource,
        /// Press position
        origin: Point,
    },
    /// Dragging, not over any drop target.
    Dragging {
        /// Requirement being dragged
        dragged: RequirementId,
        /// Where it was picked up
        source: DragSource,
    },
    /// Dragging over a drop target.
    Targeting {
        /// Requirement being dragged
        dragged: RequirementId,
        /// Where it was picked up
        source: DragSource,
        /// Requirement under the pointer
        over: RequirementId,
    },
    /// A drop is being written to storage.
    Committing {
        /// Requirement being moved
        dragged: RequirementId,
        /// Drop target
        target: RequirementId,
    },
}

/// Why a drop did not reach storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Released outside any target.
    NoTarget,
    /// Released onto itself.
    SelfDrop,
    /// The target lies below the dragged requirement.
    WouldCreateCycle,
    /// The target already is a direct parent.
    AlreadyLinked,
}

impl CancelReason {
    /// Message suitable for showing to an end user.
    pub fn message(self) -> &'static str {
        match self {
            CancelReason::NoTarget => "Drop cancelled",
            CancelReason::SelfDrop => "A requirement cannot be linked to itself",
            CancelReason::WouldCreateCycle => {
                "Cannot move here: it would create a circular reference"
            }
            CancelReason::AlreadyLinked => "These requirements are already linked",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of releasing the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Released before the drag activated; treat as a click.
    Click(RequirementId),
    /// Rejected without touching storage.
    Cancelled(CancelReason),
    /// The move was written.
    Committed {
        /// Requirement that moved
        dragged: RequirementId,
        /// Parent edge that was removed
        old_parent: Option<RequirementId>,
        /// New parent
        target: RequirementId,
        /// Closure rows removed
        relationships_deleted: usize,
        /// Closure rows added
        relationships_created: usize,
    },
}

/// State machine for a drag-and-drop move gesture.
#[derive(Debug, Default)]
pub struct DragDropReconciler {
    config: DragConfig,
    phase: DragPhase,
}

impl DragDropReconciler {
    /// Create an idle reconciler.
    pub fn new(config: DragConfig) -> Self {
        Self {
            config,
            phase: DragPhase::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    /// Whether a commit is in flight; controls should be disabled meanwhile.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, DragPhase::Committing { .. })
    }

    /// Pointer pressed on a draggable requirement.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if another gesture is still in progress.
    pub fn press(&mut self, dragged: RequirementId, source: DragSource, at: Point) -> Result<()> {
        if self.phase != DragPhase::Idle {
            return Err(Error::Validation(
                "another drag is already in progress".to_string(),
            ));
        }
        self.phase = DragPhase::Pressed {
            dragged,
            source,
            origin: at,
        };
        Ok(())
    }

    /// Pointer moved. Returns whether a drag is active afterwards.
    pub fn pointer_moved(&mut self, at: Point) -> bool {
        if let DragPhase::Pressed {
            dragged,
            source,
            origin,
        } = &self.phase
        {
            if origin.distance_to(at) <= self.config.activation_distance {
                return false;
            }
            tracing::debug!(%dragged, "Drag activated");
            self.phase = DragPhase::Dragging {
                dragged: dragged.clone(),
                source: source.clone(),
            };
        }
        matches!(
            self.phase,
            DragPhase::Dragging { .. } | DragPhase::Targeting { .. }
        )
    }

    /// Pointer entered a drop target, or left all targets with `None`.
    pub fn hover(&mut self, over: Option<RequirementId>) {
        let phase = std::mem::take(&mut self.phase);
        self.phase = match (phase, over) {
            (
                DragPhase::Dragging { dragged, source } | DragPhase::Targeting { dragged, source, .. },
                Some(over),
            ) => DragPhase::Targeting {
                dragged,
                source,
                over,
            },
            (
                DragPhase::Dragging { dragged, source } | DragPhase::Targeting { dragged, source, .. },
                None,
            ) => DragPhase::Dragging { dragged, source },
            (other, _) => other,
        };
    }

    /// Abandon the gesture without side effects.
    pub fn cancel(&mut self) {
        if !self.is_busy() {
            self.phase = DragPhase::Idle;
        }
    }

    /// Pointer released.
    ///
    /// Validates the drop against `snapshot` (the full graph, collapsed
    /// subtrees included) and, if it passes, commits it through `commands`.
    /// The reconciler is `Idle` again when this returns, whatever the result,
    /// and also if the returned future is dropped before the commit finishes.
    ///
    /// # Errors
    ///
    /// Storage and validation errors from the commit are returned unchanged,
    /// except that a two-step commit whose create step fails after the delete
    /// step succeeded yields [`Error::PartialMove`]. Nothing is rolled back.
    pub async fn release<C>(
        &mut self,
        snapshot: &ClosureSnapshot,
        commands: &mut C,
    ) -> Result<DropOutcome>
    where
        C: RelationshipCommands + ?Sized,
    {
        let phase = std::mem::take(&mut self.phase);
        let (dragged, source, target) = match phase {
            DragPhase::Idle => return Ok(DropOutcome::Cancelled(CancelReason::NoTarget)),
            DragPhase::Pressed { dragged, .. } => return Ok(DropOutcome::Click(dragged)),
            DragPhase::Dragging { dragged, .. } => {
                tracing::debug!(%dragged, "Dropped outside any target");
                return Ok(DropOutcome::Cancelled(CancelReason::NoTarget));
            }
            DragPhase::Targeting {
                dragged,
                source,
                over,
            } => (dragged, source, over),
            busy @ DragPhase::Committing { .. } => {
                self.phase = busy;
                return Err(Error::Validation(
                    "a previous drop is still being saved".to_string(),
                ));
            }
        };

        if let Some(reason) = check_drop(snapshot, &dragged, &source, &target) {
            tracing::warn!(%dragged, %target, %reason, "Drop cancelled");
            return Ok(DropOutcome::Cancelled(reason));
        }

        self.phase = DragPhase::Committing {
            dragged: dragged.clone(),
            target: target.clone(),
        };
        // Back to Idle on completion or if this future is dropped mid-commit
        let reset = ResetOnDrop(&mut self.phase);
        let result = commit(
            self.config.commit_mode,
            commands,
            &dragged,
            source.old_parent(),
            &target,
        )
        .await;
        drop(reset);

        match &result {
            Ok(_) => tracing::info!(%dragged, %target, "Drop committed"),
            Err(e) => tracing::warn!(%dragged, %target, error = %e, "Drop failed"),
        }
        result
    }
}

/// Returns the reconciler to `Idle` when dropped.
struct ResetOnDrop<'p>(&'p mut DragPhase);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        *self.0 = DragPhase::Idle;
    }
}

async fn commit<C>(
    mode: CommitMode,
    commands: &mut C,
    dragged: &RequirementId,
    old_parent: Option<&RequirementId>,
    target: &RequirementId,
) -> Result<DropOutcome>
where
    C: RelationshipCommands + ?Sized,
{
    let (relationships_deleted, relationships_created) = match mode {
        CommitMode::Atomic => {
            let outcome = commands
                .move_relationship(old_parent, target, dragged)
                .await?;
            (outcome.relationships_deleted, outcome.relationships_created)
        }
        CommitMode::TwoStep => {
            let deleted = match old_parent {
                Some(parent) => {
                    commands
                        .delete_relationship(parent, dragged)
                        .await?
                        .relationships_deleted
                }
                None => 0,
            };

            let created = match commands.create_relationship(target, dragged).await {
                Ok(outcome) => outcome.relationships_created,
                Err(source) => {
                    return Err(match old_parent {
                        Some(parent) => Error::PartialMove {
                            dragged: dragged.clone(),
                            old_parent: parent.clone(),
                            target: target.clone(),
                            source: Box::new(source),
                        },
                        None => source,
                    });
                }
            };
            (deleted, created)
        }
    };

    Ok(DropOutcome::Committed {
        dragged: dragged.clone(),
        old_parent: old_parent.cloned(),
        target: target.clone(),
        relationships_deleted,
        relationships_created,
    })
}

/// Reasons a drop must not reach storage, checked in order.
fn check_drop(
    snapshot: &ClosureSnapshot,
    dragged: &RequirementId,
    source: &DragSource,
    target: &RequirementId,
) -> Option<CancelReason> {
    if dragged == target {
        return Some(CancelReason::SelfDrop);
    }
    if snapshot.would_create_cycle(dragged, target) {
        return Some(CancelReason::WouldCreateCycle);
    }
    if source.old_parent() == Some(target) || snapshot.has_edge(target, dragged) {
        return Some(CancelReason::AlreadyLinked);
    }
    None
}
