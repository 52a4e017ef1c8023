//! Canonical undirected user pair.
//!
//! Friendships, connections, conversations and calls between two users are
//! stored once per pair. Ordering the ids (lower first) lets a single unique
//! index on `(user_low_id, user_high_id)` reject both `(A, B)` and `(B, A)`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned when a pair would relate a user to themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a user cannot be paired with themselves")]
pub struct SelfPairError;

/// Two distinct user ids in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserPair {
    low: i64,
    high: i64,
}

impl UserPair {
    /// Build the canonical pair for two users, in either order.
    pub fn new(a: i64, b: i64) -> Result<Self, SelfPairError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => Err(SelfPairError),
        }
    }

    pub fn low(&self) -> i64 {
        self.low
    }

    pub fn high(&self) -> i64 {
        self.high
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.low == user_id || self.high == user_id
    }

    /// The member of the pair that is not `user_id`.
    pub fn other(&self, user_id: i64) -> Option<i64> {
        if user_id == self.low {
            Some(self.high)
        } else if user_id == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for UserPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}
