//! Access code lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an access code.
///
/// `Active` → `Used` on the first accepted submission; an administrator may
/// force either into `Expired`, which is terminal.
///
/// Wire / storage format: lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    Active,
    Used,
    Expired,
}

impl CodeStatus {
    pub const ALL: [CodeStatus; 3] = [Self::Active, Self::Used, Self::Expired];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Expired => "expired",
        }
    }

    /// Parse the storage representation. Returns `None` for unknown values.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "used" => Some(Self::Used),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Whether a code in this state may still be used to verify or submit.
    pub fn is_usable(self) -> bool {
        !matches!(self, Self::Expired)
    }
}
