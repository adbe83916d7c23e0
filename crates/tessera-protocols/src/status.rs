//! DHT record status and status masks.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a DHT record or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Live,
    Rejected,
    Deleted,
    Modified,
}

impl Status {
    pub const fn mask(self) -> StatusMask {
        match self {
            Self::Live => StatusMask::LIVE,
            Self::Rejected => StatusMask::REJECTED,
            Self::Deleted => StatusMask::DELETED,
            Self::Modified => StatusMask::MODIFIED,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Live => "live",
            Self::Rejected => "rejected",
            Self::Deleted => "deleted",
            Self::Modified => "modified",
        };
        f.write_str(s)
    }
}

/// Set of acceptable statuses for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusMask(pub u8);

impl StatusMask {
    pub const LIVE: Self = Self(0x01);
    pub const REJECTED: Self = Self(0x02);
    pub const DELETED: Self = Self(0x04);
    pub const MODIFIED: Self = Self(0x08);
    pub const ANY: Self = Self(0xff);

    pub const fn contains(self, status: Status) -> bool {
        self.0 & status.mask().0 != 0
    }
}

impl Default for StatusMask {
    fn default() -> Self {
        Self::LIVE
    }
}

impl BitOr for StatusMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
