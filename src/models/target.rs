use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::progress::Progress;
use crate::error::{Entity, Error, Result};

/// Fewest targets a mission may hold.
pub const MIN_TARGETS: usize = 1;
/// Most targets a mission may hold.
pub const MAX_TARGETS: usize = 3;

/// A sub-objective inside a mission.
///
/// Targets have no life outside their mission: they are created with it (or
/// added to it while it is running) and deleted with it. Once a target is
/// complete its name, country, and notes are frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub name: String,
    pub country: String,
    pub notes: String,
    #[serde(rename = "complete")]
    pub state: Progress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Target {
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }
}

/// Input for creating a target, either with a new mission or added to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTargetInput {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub notes: String,
}

impl CreateTargetInput {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid("name", "target name must not be empty"));
        }
        if self.country.trim().is_empty() {
            return Err(Error::invalid("country", "must not be empty"));
        }
        Ok(())
    }
}

/// Input for patching a target. All fields are optional.
///
/// `complete: true` marks the target complete after any field edits are
/// applied, in the same step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTargetInput {
    pub name: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
    pub complete: Option<bool>,
}

/// The editable fields of a target.
#[derive(Debug, Clone, Default)]
pub struct TargetEdit {
    pub name: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
}

impl TargetEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.country.is_none() && self.notes.is_none()
    }

    fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::invalid("name", "target name must not be empty"));
        }
        if matches!(&self.country, Some(country) if country.trim().is_empty()) {
            return Err(Error::invalid("country", "must not be empty"));
        }
        Ok(())
    }
}

/// The ordered targets owned by one mission.
///
/// Always holds between [`MIN_TARGETS`] and [`MAX_TARGETS`] entries once built
/// through [`TargetSet::create_initial`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSet(Vec<Target>);

impl TargetSet {
    pub fn create_initial(
        mission_id: Uuid,
        inputs: Vec<CreateTargetInput>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !(MIN_TARGETS..=MAX_TARGETS).contains(&inputs.len()) {
            return Err(Error::InvalidTargetCount(inputs.len()));
        }
        for input in &inputs {
            input.validate()?;
        }

        Ok(Self(
            inputs
                .into_iter()
                .map(|input| new_target(mission_id, input, now))
                .collect(),
        ))
    }

    /// Rebuilds a set from stored rows, already in position order.
    pub fn from_stored(targets: Vec<Target>) -> Self {
        Self(targets)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.0.iter()
    }

    pub fn get(&self, target_id: Uuid) -> Result<&Target> {
        self.0
            .iter()
            .find(|t| t.id == target_id)
            .ok_or(Error::NotFound(Entity::Target))
    }

    fn get_mut(&mut self, target_id: Uuid) -> Result<&mut Target> {
        self.0
            .iter_mut()
            .find(|t| t.id == target_id)
            .ok_or(Error::NotFound(Entity::Target))
    }

    /// Number of targets that are not complete yet.
    pub fn remaining(&self) -> usize {
        self.0.iter().filter(|t| !t.is_complete()).count()
    }

    pub fn all_complete(&self) -> bool {
        !self.0.is_empty() && self.remaining() == 0
    }

    /// Edits a target's name, country, or notes.
    ///
    /// Fails with `TargetLocked` when the target or its mission is complete, no
    /// matter which fields are supplied.
    pub fn update(
        &mut self,
        target_id: Uuid,
        edit: TargetEdit,
        mission: Progress,
        now: DateTime<Utc>,
    ) -> Result<&Target> {
        let target = self.get_mut(target_id)?;
        if target.is_complete() || mission.is_complete() {
            return Err(Error::TargetLocked);
        }
        edit.validate()?;

        if edit.is_empty() {
            return Ok(target);
        }
        if let Some(name) = edit.name {
            target.name = name;
        }
        if let Some(country) = edit.country {
            target.country = country;
        }
        if let Some(notes) = edit.notes {
            target.notes = notes;
        }
        target.updated_at = now;
        Ok(target)
    }

    /// Marks a target complete. Returns `true` if it was not complete before.
    pub fn complete(&mut self, target_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let target = self.get_mut(target_id)?;
        let changed = target.state.complete();
        if changed {
            target.updated_at = now;
        }
        Ok(changed)
    }

    pub fn add(
        &mut self,
        mission_id: Uuid,
        input: CreateTargetInput,
        now: DateTime<Utc>,
    ) -> Result<&Target> {
        if self.0.len() >= MAX_TARGETS {
            return Err(Error::InvalidTargetCount(self.0.len() + 1));
        }
        input.validate()?;
        self.0.push(new_target(mission_id, input, now));
        Ok(&self.0[self.0.len() - 1])
    }

    /// Removes an incomplete target, keeping at least [`MIN_TARGETS`].
    pub fn remove(&mut self, target_id: Uuid) -> Result<Target> {
        let index = self
            .0
            .iter()
            .position(|t| t.id == target_id)
            .ok_or(Error::NotFound(Entity::Target))?;
        if self.0[index].is_complete() {
            return Err(Error::TargetLocked);
        }
        if self.0.len() <= MIN_TARGETS {
            return Err(Error::InvalidTargetCount(self.0.len() - 1));
        }
        Ok(self.0.remove(index))
    }
}

fn new_target(mission_id: Uuid, input: CreateTargetInput, now: DateTime<Utc>) -> Target {
    Target {
        id: Uuid::new_v4(),
        mission_id,
        name: input.name,
        country: input.country,
        notes: input.notes,
        state: Progress::Active,
        created_at: now,
        updated_at: now,
    }
}
