use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Completion state shared by missions and targets.
///
/// A two-state machine: `Active` → `Complete`. There is no way back, so the only
/// transition offered is [`Progress::complete`]. On the wire the state is the
/// boolean `complete` field; in the database it is stored as text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Progress {
    #[default]
    Active,
    Complete,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Moves to `Complete`. Returns `true` if the state changed.
    pub fn complete(&mut self) -> bool {
        let changed = *self == Self::Active;
        *self = Self::Complete;
        changed
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Complete => "complete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

impl Serialize for Progress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.is_complete())
    }
}

impl<'de> Deserialize<'de> for Progress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(if bool::deserialize(deserializer)? {
            Self::Complete
        } else {
            Self::Active
        })
    }
}
