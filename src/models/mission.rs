use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cat::Cat;
use super::progress::Progress;
use super::target::{CreateTargetInput, Target, TargetEdit, TargetSet, UpdateTargetInput};
use crate::error::{Error, Result};

/// A unit of work holding one to three targets, optionally run by one cat.
///
/// The mission owns its targets. The cat is only referenced: unassigning or
/// completing a mission never touches the cat record itself.
///
/// # Lifecycle
/// A mission starts active and unassigned. It becomes complete exactly when its
/// last target completes (or through an explicit completion once every target
/// is done), and stays complete forever. Name and description freeze at that
/// point, as do all target fields. The cat reference survives completion until
/// someone unassigns it, but a complete mission no longer keeps the cat busy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub cat_id: Option<Uuid>,
    #[serde(rename = "complete")]
    pub state: Progress,
    pub targets: TargetSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a mission together with its initial targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMissionInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub targets: Vec<CreateTargetInput>,
}

/// Input for updating a mission. All fields are optional for partial updates.
///
/// Targets, the assigned cat, and completion have their own operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMissionInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Full replacement of a mission's editable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceMissionInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl From<ReplaceMissionInput> for UpdateMissionInput {
    fn from(input: ReplaceMissionInput) -> Self {
        Self {
            name: Some(input.name),
            description: Some(input.description),
        }
    }
}

/// A mission as returned by the API: the mission's own fields plus the full
/// record of its assigned cat under `cat_details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionDetails {
    #[serde(flatten)]
    pub mission: Mission,
    pub cat_details: Option<Cat>,
}

/// Input for assigning a cat to a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignCatInput {
    pub cat_id: Uuid,
}

/// Filter for listing missions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionFilter {
    pub complete: Option<bool>,
    pub cat_id: Option<Uuid>,
}

impl Mission {
    pub fn new(input: CreateMissionInput, now: DateTime<Utc>) -> Result<Self> {
        let id = Uuid::new_v4();
        let targets = TargetSet::create_initial(id, input.targets, now)?;
        validate_name(&input.name)?;

        Ok(Self {
            id,
            name: input.name,
            description: input.description,
            cat_id: None,
            state: Progress::Active,
            targets,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// The cat this mission keeps busy: its assigned cat while the mission is
    /// still active.
    pub fn engaged_cat(&self) -> Option<Uuid> {
        if self.is_complete() {
            None
        } else {
            self.cat_id
        }
    }

    pub fn update(&mut self, input: UpdateMissionInput, now: DateTime<Utc>) -> Result<()> {
        if self.is_complete() {
            return Err(Error::MissionLocked);
        }
        if let Some(name) = &input.name {
            validate_name(name)?;
        }

        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_deletable(&self) -> Result<()> {
        if self.cat_id.is_some() {
            return Err(Error::MissionAssigned);
        }
        Ok(())
    }

    // ============================================================
    // Assignment
    // ============================================================

    /// Binds `cat_id` to this mission.
    ///
    /// `engaged_on` is the incomplete mission the cat currently runs, if any.
    /// Returns `false` when the cat was already assigned here (nothing to do).
    pub fn assign_cat(
        &mut self,
        cat_id: Uuid,
        engaged_on: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if self.is_complete() {
            return Err(Error::MissionComplete);
        }
        if self.cat_id == Some(cat_id) {
            return Ok(false);
        }
        if let Some(mission_id) = engaged_on {
            return Err(Error::CatBusy { mission_id });
        }
        if let Some(current) = self.cat_id {
            return Err(Error::AlreadyAssigned { cat_id: current });
        }

        self.cat_id = Some(cat_id);
        self.updated_at = now;
        Ok(true)
    }

    /// Clears the cat reference. Allowed in any state. Returns the previous cat.
    pub fn unassign_cat(&mut self, now: DateTime<Utc>) -> Option<Uuid> {
        let previous = self.cat_id.take();
        if previous.is_some() {
            self.updated_at = now;
        }
        previous
    }

    // ============================================================
    // Targets
    // ============================================================

    /// Applies a target patch: field edits first, then completion if requested.
    pub fn update_target(
        &mut self,
        target_id: Uuid,
        input: UpdateTargetInput,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let UpdateTargetInput {
            name,
            country,
            notes,
            complete,
        } = input;
        let edit = TargetEdit {
            name,
            country,
            notes,
        };

        match complete {
            Some(true) if edit.is_empty() => {
                self.complete_target(target_id, now)?;
                return Ok(());
            }
            Some(false) if self.targets.get(target_id)?.is_complete() => {
                return Err(Error::TargetLocked);
            }
            _ => {}
        }

        self.targets.update(target_id, edit, self.state, now)?;
        if complete == Some(true) {
            self.complete_target(target_id, now)?;
        }
        Ok(())
    }

    /// Marks one target complete and re-evaluates the mission.
    ///
    /// Returns `true` if the target changed state.
    pub fn complete_target(&mut self, target_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let changed = self.targets.complete(target_id, now)?;
        if changed {
            self.settle(now);
        }
        Ok(changed)
    }

    pub fn add_target(&mut self, input: CreateTargetInput, now: DateTime<Utc>) -> Result<&Target> {
        if self.is_complete() {
            return Err(Error::MissionLocked);
        }
        self.updated_at = now;
        self.targets.add(self.id, input, now)
    }

    pub fn remove_target(&mut self, target_id: Uuid, now: DateTime<Utc>) -> Result<Target> {
        self.targets.get(target_id)?;
        if self.is_complete() {
            return Err(Error::MissionLocked);
        }
        let removed = self.targets.remove(target_id)?;
        self.updated_at = now;
        self.settle(now);
        Ok(removed)
    }

    // ============================================================
    // Completion
    // ============================================================

    /// Explicit completion request. Idempotent once the mission is complete.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.is_complete() {
            return Ok(false);
        }
        let remaining = self.targets.remaining();
        if remaining > 0 {
            return Err(Error::IncompleteTargets { remaining });
        }
        Ok(self.settle(now))
    }

    /// Completes the mission once every target is complete.
    ///
    /// Runs after any change to the target set. The assigned cat is left in
    /// place. Returns `true` if the mission just became complete.
    fn settle(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_complete() || !self.targets.all_complete() {
            return false;
        }
        self.state.complete();
        self.updated_at = now;
        tracing::debug!("Mission {} completed", self.id);
        true
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid("name", "mission name must not be empty"));
    }
    Ok(())
}
