//! Index entries and the order used to rank them

use std::cmp::Ordering;
use std::fmt;

use crate::base::{CustomerId, Score};

/// An index entry: the key is the (id, score) pair since the same customer
/// moves between partitions when its score changes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Customer {
    pub id: CustomerId,
    pub score: Score,
}

impl Customer {
    pub fn new(id: CustomerId, score: Score) -> Self {
        Self { id, score }
    }
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.id, self.score)
    }
}

/// Leaderboard order: higher scores first, then lower IDs first
impl Ord for Customer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for Customer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
