use thiserror::Error;

use crate::base::{CustomerId, Score};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeaderboardError {
    #[error("illegal customer ID {0} (must be positive)")]
    InvalidCustomerId(CustomerId),

    #[error("illegal score delta {0} (must be within [-1000, 1000])")]
    InvalidDelta(Score),

    /// No partition covers the score: the partition sequence is corrupted
    #[error("cannot find any partition for score {score}")]
    MissingPartition { score: Score },
}

impl LeaderboardError {
    /// True for errors caused by caller-supplied values
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            LeaderboardError::InvalidCustomerId(_) | LeaderboardError::InvalidDelta(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LeaderboardError>;
