//! A slice (min, max] of the score domain

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::trace;
use rust_decimal::Decimal;

use crate::base::{CustomerId, Rank, Score};
use crate::customer::Customer;

/// Holds the customers whose score is in (min_score, max_score], sorted in
/// leaderboard order, together with the global rank window they occupy
pub struct Partition {
    pub min_score: Score,
    pub max_score: Score,

    /// First global rank (0 when empty or not yet computed)
    high_rank: AtomicUsize,

    /// Last global rank (0 when empty or not yet computed)
    low_rank: AtomicUsize,

    members: Vec<Customer>,
}

impl Partition {
    pub fn new(min_score: Score, max_score: Score) -> Self {
        Self::with_members(min_score, max_score, Vec::new())
    }

    /// Builds a partition from members already in leaderboard order
    fn with_members(min_score: Score, max_score: Score, members: Vec<Customer>) -> Self {
        debug_assert!(members.windows(2).all(|w| w[0] < w[1]));
        Self {
            min_score,
            max_score,
            high_rank: AtomicUsize::new(0),
            low_rank: AtomicUsize::new(0),
            members,
        }
    }

    /// Whether the score falls in (min_score, max_score]
    #[inline]
    pub fn contains(&self, score: Score) -> bool {
        self.min_score < score && score <= self.max_score
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Customer] {
        &self.members
    }

    /// Inserts the customer at its sorted position. Returns false if the
    /// (id, score) pair is already present
    pub fn insert(&mut self, customer: Customer) -> bool {
        match self.members.binary_search(&customer) {
            Ok(_) => {
                trace!("Customer {} already in partition", customer);
                false
            }
            Err(position) => {
                self.members.insert(position, customer);
                true
            }
        }
    }

    /// Removes the (id, score) entry, returning false if it was absent
    pub fn remove(&mut self, id: CustomerId, score: Score) -> bool {
        match self.members.binary_search(&Customer::new(id, score)) {
            Ok(position) => {
                self.members.remove(position);
                true
            }
            Err(_) => false,
        }
    }

    /// 0-based position of the (id, score) entry
    pub fn index_of(&self, id: CustomerId, score: Score) -> Option<usize> {
        self.members.binary_search(&Customer::new(id, score)).ok()
    }

    pub fn high_rank(&self) -> Rank {
        self.high_rank.load(Ordering::Relaxed)
    }

    pub fn low_rank(&self) -> Rank {
        self.low_rank.load(Ordering::Relaxed)
    }

    /// Sets the rank window; callers must serialize the writes
    pub(crate) fn set_ranks(&self, high: Rank, low: Rank) {
        self.high_rank.store(high, Ordering::Relaxed);
        self.low_rank.store(low, Ordering::Relaxed);
    }

    /// Mean of the member scores, rounded to `precision` fractional digits
    pub fn mean_score(&self, precision: u32) -> Option<Score> {
        if self.members.is_empty() {
            return None;
        }
        let total: Decimal = self.members.iter().map(|c| c.score).sum();
        Some((total / Decimal::from(self.members.len())).round_dp(precision))
    }

    /// Moves the members with a score above `mid` into a new partition
    /// covering (mid, max_score], and narrows this one to (min_score, mid].
    ///
    /// Both member lists are rebuilt from scratch.
    pub fn split_off(&mut self, mid: Score) -> Partition {
        debug_assert!(self.contains(mid));

        let (higher, lower): (Vec<Customer>, Vec<Customer>) = std::mem::take(&mut self.members)
            .into_iter()
            .partition(|c| c.score > mid);

        let higher = Partition::with_members(mid, self.max_score, higher);
        self.max_score = mid;
        self.members = lower;
        self.set_ranks(0, 0);
        higher
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(score: ({}, {}], len: {}, ranks: [{}, {}])",
            self.min_score,
            self.max_score,
            self.len(),
            self.high_rank(),
            self.low_rank()
        )
    }
}
