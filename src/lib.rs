pub mod base;
pub mod customer;
pub mod error;
pub mod index;
pub mod partition;
pub mod store;

#[cfg(feature = "python")]
pub mod py;

pub use base::{CustomerId, LeaderboardItem, Rank, Score};
pub use error::{LeaderboardError, Result};
pub use index::{IndexOptions, ScoreIndex};
pub use store::ScoreStore;
