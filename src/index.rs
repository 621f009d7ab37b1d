//! Partitioned, rank-aware index of the ranked customers
//!
//! The index is a sequence of partitions covering (0, Decimal::MAX], highest
//! scores first. Each partition caches the global rank window of its members;
//! the windows are recomputed lazily by the first query that follows a
//! structural change.
//!
//! Locking: every structural change holds the `partitions` write lock. Queries
//! hold the read lock, and the rank refresh runs under it, serialized by
//! `refresh_lock`. The refresh lock is always taken after the partition lock.

use std::sync::atomic::{AtomicBool, Ordering};

use derivative::Derivative;
use log::{debug, error, trace};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;

use crate::base::{CustomerId, LeaderboardItem, Rank, Score};
use crate::customer::Customer;
use crate::error::{LeaderboardError, Result};
use crate::partition::Partition;

#[derive(Derivative, Clone, Debug)]
#[derivative(Default)]
pub struct IndexOptions {
    /// A partition holding more customers than this is split in two
    #[derivative(Default(value = "25_000"))]
    pub split_threshold: usize,

    /// Number of fractional digits of the split boundary
    #[derivative(Default(value = "5"))]
    pub score_precision: u32,
}

pub struct ScoreIndex {
    options: IndexOptions,

    /// Non-overlapping partitions, ordered by decreasing score range
    partitions: RwLock<Vec<Partition>>,

    /// Set when the partition rank windows are stale
    rank_dirty: AtomicBool,

    /// Serializes the rank refresh between concurrent readers
    refresh_lock: Mutex<()>,
}

impl Default for ScoreIndex {
    fn default() -> Self {
        Self::new(&IndexOptions::default())
    }
}

/// The initial partition sequence: one empty partition covering every
/// positive score
fn full_range() -> Vec<Partition> {
    vec![Partition::new(Decimal::ZERO, Decimal::MAX)]
}

/// Returns the position of the partition containing the score
fn locate(partitions: &[Partition], score: Score) -> Result<usize> {
    partitions
        .iter()
        .position(|p| p.contains(score))
        .ok_or_else(|| {
            error!("cannot find any partition for score {}", score);
            LeaderboardError::MissingPartition { score }
        })
}

impl ScoreIndex {
    pub fn new(options: &IndexOptions) -> Self {
        Self {
            options: options.clone(),
            partitions: RwLock::new(full_range()),
            rank_dirty: AtomicBool::new(true),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    #[inline]
    fn mark_dirty(&self) {
        self.rank_dirty.store(true, Ordering::Release);
    }

    /// Adds a customer with a positive score
    pub fn add_customer(&self, id: CustomerId, score: Score) -> Result<()> {
        let mut partitions = self.partitions.write();
        let ix = locate(&partitions, score)?;

        if !partitions[ix].insert(Customer::new(id, score)) {
            debug!("Customer ({}, {}) was already indexed", id, score);
        }
        if partitions[ix].len() > self.options.split_threshold {
            self.split_partition(&mut partitions, ix);
        }

        self.mark_dirty();
        Ok(())
    }

    /// Removes the (id, score) entry
    pub fn remove_customer(&self, id: CustomerId, score: Score) -> Result<()> {
        let mut partitions = self.partitions.write();
        let ix = locate(&partitions, score)?;

        if !partitions[ix].remove(id, score) {
            debug!("Customer ({}, {}) was not indexed", id, score);
        }

        self.mark_dirty();
        Ok(())
    }

    /// Moves a customer from `old_score` to `new_score` (both positive)
    pub fn replace_customer_score(
        &self,
        id: CustomerId,
        old_score: Score,
        new_score: Score,
    ) -> Result<()> {
        let mut partitions = self.partitions.write();
        let source = locate(&partitions, old_score)?;

        if partitions[source].contains(new_score) {
            // Same partition: the member count, and thus every rank window,
            // is unchanged
            let partition = &mut partitions[source];
            partition.remove(id, old_score);
            partition.insert(Customer::new(id, new_score));
            trace!("Customer {} moved to {} within {}", id, new_score, partition);
            return Ok(());
        }

        let target = locate(&partitions, new_score)?;
        partitions[source].remove(id, old_score);
        partitions[target].insert(Customer::new(id, new_score));

        // Only the source partition is checked here; the target is checked
        // by the next insertion it receives
        if partitions[source].len() > self.options.split_threshold {
            self.split_partition(&mut partitions, source);
        }

        self.mark_dirty();
        Ok(())
    }

    /// Splits the partition at the mean of its scores, inserting the upper
    /// half just before it in the sequence
    fn split_partition(&self, partitions: &mut Vec<Partition>, ix: usize) {
        let partition = &mut partitions[ix];
        let Some(mid) = partition.mean_score(self.options.score_precision) else {
            return;
        };

        // The boundary must leave members on both sides
        let members = partition.members();
        let splittable = match (members.first(), members.last()) {
            (Some(first), Some(last)) => first.score > mid && last.score <= mid,
            _ => false,
        };
        if !splittable {
            debug!("Not splitting {} at {}: one side would be empty", partition, mid);
            return;
        }

        let higher = partition.split_off(mid);
        debug!(
            "Split partition at {}: {} above, {} below",
            mid,
            higher.len(),
            partition.len()
        );
        partitions.insert(ix, higher);
    }

    /// Recomputes the partition rank windows if a structural change happened
    /// since the last refresh. Must be called with the partition lock held.
    fn refresh_ranks(&self, partitions: &[Partition]) {
        if !self.rank_dirty.load(Ordering::Acquire) {
            return;
        }

        let _guard = self.refresh_lock.lock();
        if !self.rank_dirty.load(Ordering::Acquire) {
            // Refreshed by another reader in the meantime
            return;
        }

        let mut rank: Rank = 1;
        for partition in partitions.iter() {
            if partition.is_empty() {
                partition.set_ranks(0, 0);
            } else {
                partition.set_ranks(rank, rank + partition.len() - 1);
                rank += partition.len();
            }
        }
        debug!(
            "Refreshed ranks of {} partitions ({} customers)",
            partitions.len(),
            rank - 1
        );

        self.rank_dirty.store(false, Ordering::Release);
    }

    /// Collects the customers with a rank in [high, low], assuming fresh
    /// rank windows
    fn collect_range(partitions: &[Partition], high: Rank, low: Rank) -> Vec<LeaderboardItem> {
        let mut items = Vec::new();
        if high > low {
            return items;
        }

        for partition in partitions.iter() {
            if partition.is_empty() || partition.high_rank() > low || partition.low_rank() < high {
                continue;
            }

            // First rank taken from this partition
            let start = partition.high_rank().max(high);
            let end = partition.low_rank().min(low);
            let skip = start - partition.high_rank();

            items.extend(
                partition
                    .members()
                    .iter()
                    .skip(skip)
                    .take(end - start + 1)
                    .enumerate()
                    .map(|(offset, customer)| LeaderboardItem {
                        customer_id: customer.id,
                        score: customer.score,
                        rank: start + offset,
                    }),
            );
        }

        items
    }

    fn rank_of(partitions: &[Partition], id: CustomerId, score: Score) -> Result<Option<Rank>> {
        let partition = &partitions[locate(partitions, score)?];
        Ok(partition
            .index_of(id, score)
            .map(|position| partition.high_rank() + position))
    }

    /// Returns the customers ranked within [high, low] (1-based, inclusive),
    /// in rank order
    pub fn rank_range(&self, high: Rank, low: Rank) -> Vec<LeaderboardItem> {
        let partitions = self.partitions.read();
        self.refresh_ranks(&partitions);
        Self::collect_range(&partitions, high, low)
    }

    /// Returns the rank of the (id, score) entry, if indexed
    pub fn customer_rank(&self, id: CustomerId, score: Score) -> Result<Option<Rank>> {
        let partitions = self.partitions.read();
        self.refresh_ranks(&partitions);
        Self::rank_of(&partitions, id, score)
    }

    /// Returns the customer's item, or with a non-zero `high`/`low` the
    /// items ranked from `high` places above to `low` places below it
    pub fn customer_ranks_by_id(
        &self,
        id: CustomerId,
        score: Score,
        high: Rank,
        low: Rank,
    ) -> Result<Vec<LeaderboardItem>> {
        let partitions = self.partitions.read();
        self.refresh_ranks(&partitions);

        let Some(rank) = Self::rank_of(&partitions, id, score)? else {
            return Ok(Vec::new());
        };

        if high == 0 && low == 0 {
            return Ok(vec![LeaderboardItem {
                customer_id: id,
                score,
                rank,
            }]);
        }

        Ok(Self::collect_range(
            &partitions,
            rank.saturating_sub(high),
            rank.saturating_add(low),
        ))
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.read().len()
    }

    /// The (min, max] score range of each partition, in sequence order
    pub fn partition_ranges(&self) -> Vec<(Score, Score)> {
        self.partitions
            .read()
            .iter()
            .map(|p| (p.min_score, p.max_score))
            .collect()
    }

    /// Number of ranked customers
    pub fn len(&self) -> usize {
        self.partitions.read().iter().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.read().iter().all(|p| p.is_empty())
    }

    /// Drops every customer and partition
    pub fn clear(&self) {
        let mut partitions = self.partitions.write();
        *partitions = full_range();
        self.mark_dirty();
    }

    /// Replaces the partitions by a single empty one covering
    /// (min_score, MAX], leaving lower scores uncovered
    #[cfg(test)]
    pub(crate) fn restrict_coverage(&self, min_score: Score) {
        let mut partitions = self.partitions.write();
        *partitions = vec![Partition::new(min_score, Decimal::MAX)];
        self.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::{IndexOptions, ScoreIndex};
    use crate::error::LeaderboardError;
    use rust_decimal::Decimal;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn small_index(split_threshold: usize) -> ScoreIndex {
        ScoreIndex::new(&IndexOptions {
            split_threshold,
            ..Default::default()
        })
    }

    fn ids(index: &ScoreIndex, high: usize, low: usize) -> Vec<i64> {
        index
            .rank_range(high, low)
            .iter()
            .map(|item| item.customer_id)
            .collect()
    }

    #[test]
    fn test_default_options() {
        let options = IndexOptions::default();
        assert_eq!(options.split_threshold, 25_000);
        assert_eq!(options.score_precision, 5);
    }

    #[test]
    fn test_non_positive_score_has_no_partition() {
        let index = ScoreIndex::default();
        assert_eq!(
            index.add_customer(1, Decimal::ZERO),
            Err(LeaderboardError::MissingPartition {
                score: Decimal::ZERO
            })
        );
        assert!(index.add_customer(1, d(-3)).is_err());
        assert!(index.customer_rank(1, d(-3)).is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_split_at_threshold() {
        let index = small_index(4);
        for id in 1..=4 {
            index.add_customer(id, d(id)).expect("add");
        }
        assert_eq!(index.partition_count(), 1);

        index.add_customer(5, d(5)).expect("add");
        assert_eq!(index.partition_count(), 2);
        // Mean is 3: (3, MAX] then (0, 3]
        assert_eq!(
            index.partition_ranges(),
            vec![(d(3), Decimal::MAX), (Decimal::ZERO, d(3))]
        );
        assert_eq!(ids(&index, 1, 5), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_equal_scores_do_not_split() {
        let index = small_index(2);
        for id in 1..=5 {
            index.add_customer(id, d(7)).expect("add");
        }
        assert_eq!(index.partition_count(), 1);
        assert_eq!(ids(&index, 1, 5), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_range_across_partitions() {
        let index = small_index(3);
        for id in 1..=10 {
            index.add_customer(id, d(id * 10)).expect("add");
        }
        assert!(index.partition_count() > 1);

        assert_eq!(ids(&index, 1, 10), (1..=10).rev().collect::<Vec<_>>());
        assert_eq!(ids(&index, 3, 6), vec![8, 7, 6, 5]);
        assert_eq!(ids(&index, 10, 10), vec![1]);
        assert_eq!(ids(&index, 10, 20), vec![1]);
        assert!(ids(&index, 11, 20).is_empty());
        assert!(ids(&index, 5, 4).is_empty());

        let ranks: Vec<_> = index.rank_range(1, 10).iter().map(|i| i.rank).collect();
        assert_eq!(ranks, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_range_with_empty_partition() {
        let index = small_index(3);
        for id in 1..=4 {
            index.add_customer(id, d(id * 10)).expect("add");
        }
        assert_eq!(index.partition_count(), 2);

        // Empty the upper partition
        index.remove_customer(4, d(40)).expect("remove");
        index.remove_customer(3, d(30)).expect("remove");
        assert_eq!(ids(&index, 1, 5), vec![2, 1]);
        assert_eq!(index.customer_rank(2, d(20)), Ok(Some(1)));
    }

    #[test]
    fn test_replace_within_partition_reorders() {
        let index = ScoreIndex::default();
        index.add_customer(1, d(10)).expect("add");
        index.add_customer(2, d(20)).expect("add");
        assert_eq!(ids(&index, 1, 2), vec![2, 1]);

        index.replace_customer_score(1, d(10), d(30)).expect("replace");
        assert_eq!(ids(&index, 1, 2), vec![1, 2]);
        assert_eq!(index.customer_rank(1, d(30)), Ok(Some(1)));
        assert_eq!(index.customer_rank(1, d(10)), Ok(None));
    }

    #[test]
    fn test_replace_across_partitions() {
        let index = small_index(3);
        for id in 1..=4 {
            index.add_customer(id, d(id * 10)).expect("add");
        }
        assert_eq!(index.partition_count(), 2);

        index.replace_customer_score(1, d(10), d(100)).expect("replace");
        assert_eq!(ids(&index, 1, 4), vec![1, 4, 3, 2]);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_replace_checks_source_partition_only() {
        let index = small_index(3);
        for id in 1..=4 {
            index.add_customer(id, d(id * 10)).expect("add");
        }
        index.add_customer(5, d(5)).expect("add");
        // (25, MAX] holds 40, 30 and (0, 25] holds 20, 10, 5
        assert_eq!(index.partition_count(), 2);

        // Fill the upper partition past the threshold through moves only
        index.replace_customer_score(5, d(5), d(50)).expect("replace");
        index.replace_customer_score(1, d(10), d(60)).expect("replace");
        assert_eq!(index.partition_count(), 2);
        assert_eq!(
            index.partition_ranges(),
            vec![(d(25), Decimal::MAX), (Decimal::ZERO, d(25))]
        );
        assert_eq!(ids(&index, 1, 5), vec![1, 5, 4, 3, 2]);
        assert_eq!(index.customer_rank(2, d(20)), Ok(Some(5)));

        // The next insertion into the upper partition splits it at 50
        index.add_customer(6, d(70)).expect("add");
        assert_eq!(index.partition_count(), 3);
        assert_eq!(
            index.partition_ranges(),
            vec![
                (d(50), Decimal::MAX),
                (d(25), d(50)),
                (Decimal::ZERO, d(25))
            ]
        );
        assert_eq!(ids(&index, 1, 6), vec![6, 1, 5, 4, 3, 2]);
    }

    #[test]
    fn test_customer_ranks_by_id_window() {
        let index = ScoreIndex::default();
        for id in 1..=5 {
            index.add_customer(id, d(id)).expect("add");
        }
        // Ranks: 5 -> 1, 4 -> 2, 3 -> 3, 2 -> 4, 1 -> 5
        let single = index.customer_ranks_by_id(3, d(3), 0, 0).expect("query");
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].rank, 3);

        let window: Vec<_> = index
            .customer_ranks_by_id(4, d(4), 5, 1)
            .expect("query")
            .iter()
            .map(|item| (item.customer_id, item.rank))
            .collect();
        assert_eq!(window, vec![(5, 1), (4, 2), (3, 3)]);

        assert!(index
            .customer_ranks_by_id(4, d(5), 1, 1)
            .expect("query")
            .is_empty());
    }

    #[test]
    fn test_clear() {
        let index = small_index(2);
        for id in 1..=10 {
            index.add_customer(id, d(id)).expect("add");
        }
        assert!(index.partition_count() > 1);

        index.clear();
        assert_eq!(index.partition_count(), 1);
        assert!(index.rank_range(1, 100).is_empty());
        assert_eq!(index.len(), 0);
    }
}
