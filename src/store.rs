//! Customer scores and the single entry point for score updates
//!
//! Lock order: reset guard, then the customer's mutex, then the index locks.
//! The `customers` shard guards are never held while taking any of them.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;

use crate::base::{CustomerId, LeaderboardItem, Rank, Score};
use crate::error::{LeaderboardError, Result};
use crate::index::{IndexOptions, ScoreIndex};

/// Maximum absolute value of a score update
pub const MAX_DELTA: Score = Decimal::ONE_THOUSAND;

pub struct ScoreStore {
    /// Cumulative score of every customer seen so far (ranked or not)
    customers: DashMap<CustomerId, Arc<Mutex<Score>>>,

    /// Ranked customers, i.e. those with a positive score
    index: ScoreIndex,

    /// Held shared by updates and exclusively by `clear`
    reset_guard: RwLock<()>,
}

impl Default for ScoreStore {
    fn default() -> Self {
        Self::new(&IndexOptions::default())
    }
}

impl ScoreStore {
    pub fn new(options: &IndexOptions) -> Self {
        Self {
            customers: DashMap::new(),
            index: ScoreIndex::new(options),
            reset_guard: RwLock::new(()),
        }
    }

    pub fn index(&self) -> &ScoreIndex {
        &self.index
    }

    fn customer(&self, id: CustomerId) -> Option<Arc<Mutex<Score>>> {
        self.customers.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Adds `delta` to the customer's score and returns the new score.
    ///
    /// A customer enters the index when its score becomes positive and
    /// leaves it when the score drops to zero or below.
    pub fn update_score(&self, id: CustomerId, delta: Score) -> Result<Score> {
        if id <= 0 {
            return Err(LeaderboardError::InvalidCustomerId(id));
        }
        if delta < -MAX_DELTA || delta > MAX_DELTA {
            return Err(LeaderboardError::InvalidDelta(delta));
        }

        let _reset = self.reset_guard.read();
        let (customer, created) = match self.customers.entry(id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let customer = Arc::new(Mutex::new(Decimal::ZERO));
                entry.insert(Arc::clone(&customer));
                (customer, true)
            }
        };

        let mut score = customer.lock();
        let old_score = *score;
        let new_score = old_score + delta;

        let indexed = match (old_score > Decimal::ZERO, new_score > Decimal::ZERO) {
            (true, true) => self
                .index
                .replace_customer_score(id, old_score, new_score),
            (true, false) => self.index.remove_customer(id, old_score),
            (false, true) => self.index.add_customer(id, new_score),
            (false, false) => Ok(()),
        };
        if let Err(e) = indexed {
            if created {
                // Forget the entry created above unless another update
                // already holds it
                self.customers.remove_if(&id, |_, c| {
                    Arc::ptr_eq(c, &customer) && Arc::strong_count(c) == 2
                });
            }
            return Err(e);
        }

        // Committed only once the index agrees
        *score = new_score;
        trace!("Customer {}: {} -> {}", id, old_score, new_score);

        Ok(new_score)
    }

    /// Customers ranked within [start, end]
    pub fn rank_range(&self, start: Rank, end: Rank) -> Vec<LeaderboardItem> {
        self.index.rank_range(start, end)
    }

    /// The customer's item, surrounded by `high` customers above and `low`
    /// below. Empty if the customer is unknown or unranked.
    pub fn customer_rank_by_id(
        &self,
        id: CustomerId,
        high: Rank,
        low: Rank,
    ) -> Result<Vec<LeaderboardItem>> {
        let Some(customer) = self.customer(id) else {
            return Ok(Vec::new());
        };

        let score = customer.lock();
        if *score <= Decimal::ZERO {
            return Ok(Vec::new());
        }
        self.index.customer_ranks_by_id(id, *score, high, low)
    }

    /// Current cumulative score of a customer
    pub fn score(&self, id: CustomerId) -> Option<Score> {
        self.customer(id).map(|customer| *customer.lock())
    }

    /// Number of customers seen, ranked or not
    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    pub fn partition_count(&self) -> usize {
        self.index.partition_count()
    }

    /// Forgets every customer
    pub fn clear(&self) {
        let _reset = self.reset_guard.write();
        self.customers.clear();
        self.index.clear();
        debug!("Score store cleared");
    }
}
