//! Memory visibility scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who a memory is shared with.
///
/// Stored as `VARCHAR(16)` with a CHECK constraint:
/// `circle | direct | private | public | followers | friends | story`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    /// Members of one circle
    Circle,
    /// A single recipient
    Direct,
    /// The author only
    Private,
    /// Everyone
    Public,
    /// The author's followers
    Followers,
    /// The author's friends
    Friends,
    /// Followers and friends, until the story expires
    Story,
}

impl MemoryScope {
    pub const ALL: [MemoryScope; 7] = [
        Self::Circle,
        Self::Direct,
        Self::Private,
        Self::Public,
        Self::Followers,
        Self::Friends,
        Self::Story,
    ];

    /// Parse the database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "circle" => Some(Self::Circle),
            "direct" => Some(Self::Direct),
            "private" => Some(Self::Private),
            "public" => Some(Self::Public),
            "followers" => Some(Self::Followers),
            "friends" => Some(Self::Friends),
            "story" => Some(Self::Story),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Direct => "direct",
            Self::Private => "private",
            Self::Public => "public",
            Self::Followers => "followers",
            Self::Friends => "friends",
            Self::Story => "story",
        }
    }

    /// Scopes a reshare may be published under.
    pub fn allowed_for_reshare(&self) -> bool {
        matches!(self, Self::Public | Self::Followers | Self::Friends)
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
