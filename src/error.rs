use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Result alias used by every core operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of record an operation failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Cat,
    Mission,
    Target,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cat => "Cat",
            Self::Mission => "Mission",
            Self::Target => "Target",
        })
    }
}

/// Domain-level failures.
///
/// Every guard in the cat/mission/target state machine reports one of these.
/// The HTTP layer maps them to status codes; nothing here knows about HTTP.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unrecognized cat breed: {0}")]
    InvalidBreed(String),

    #[error("Mission must have between 1 and 3 targets, got {0}")]
    InvalidTargetCount(usize),

    #[error("Cat is assigned to incomplete mission {mission_id}")]
    CatAssigned { mission_id: Uuid },

    #[error("Cat is already engaged on mission {mission_id}")]
    CatBusy { mission_id: Uuid },

    #[error("Mission already has cat {cat_id} assigned")]
    AlreadyAssigned { cat_id: Uuid },

    #[error("Cannot delete a mission that is assigned to a cat")]
    MissionAssigned,

    #[error("Mission is already complete")]
    MissionComplete,

    #[error("Mission is complete and can no longer be modified")]
    MissionLocked,

    #[error("Target is locked because it or its mission is complete")]
    TargetLocked,

    #[error("Mission still has {remaining} incomplete target(s)")]
    IncompleteTargets { remaining: usize },

    #[error("Unable to validate breed at this time: {0}")]
    ValidationUnavailable(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Stable snake_case name of the error kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidField { .. } => "invalid_field",
            Self::InvalidBreed(_) => "invalid_breed",
            Self::InvalidTargetCount(_) => "invalid_target_count",
            Self::CatAssigned { .. } => "cat_assigned",
            Self::CatBusy { .. } => "cat_busy",
            Self::AlreadyAssigned { .. } => "already_assigned",
            Self::MissionAssigned => "mission_assigned",
            Self::MissionComplete => "mission_complete",
            Self::MissionLocked => "mission_locked",
            Self::TargetLocked => "target_locked",
            Self::IncompleteTargets { .. } => "incomplete_targets",
            Self::ValidationUnavailable(_) => "validation_unavailable",
            Self::Storage(_) => "storage",
        }
    }
}
