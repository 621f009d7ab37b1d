use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type CustomerId = i64;
pub type Score = Decimal;
pub type Rank = usize;

/// Customer + score + global rank, as returned by queries
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardItem {
    pub customer_id: CustomerId,
    pub score: Score,
    pub rank: Rank,
}

impl std::fmt::Display for LeaderboardItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} ({},{})", self.rank, self.customer_id, self.score)
    }
}
