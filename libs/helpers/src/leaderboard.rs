use log::debug;
use rust_decimal::Decimal;

use crate::customers::{create_customers, ScoreDistribution, TestCustomer};
use leaderboard_index::{LeaderboardItem, Score, ScoreStore};

/// Applies each customer score as a single update
pub fn populate(store: &ScoreStore, customers: &[TestCustomer]) {
    for customer in customers.iter() {
        store
            .update_score(customer.id, customer.score)
            .expect("Error while updating a score");
    }
    debug!(
        "Populated {} customers in {} partitions",
        customers.len(),
        store.partition_count()
    );
}

/// Populates the store with `count` random customers, and returns the
/// resulting partition count
pub fn partition_count_for(store: &ScoreStore, count: usize, seed: Option<u64>) -> usize {
    let customers = create_customers(count, ScoreDistribution::Uniform, seed);
    populate(store, &customers);
    store.partition_count()
}

/// Checks that items are in leaderboard order with consecutive ranks
pub fn check_leaderboard_order(items: &[LeaderboardItem]) {
    for pair in items.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            b.rank == a.rank + 1,
            "Ranks are not consecutive: {} then {}",
            a,
            b
        );
        assert!(
            a.score > b.score || (a.score == b.score && a.customer_id < b.customer_id),
            "Items are not in leaderboard order: {} then {}",
            a,
            b
        );
    }
}

/// Checks that partition ranges cover (0, MAX] without gaps or overlaps,
/// highest range first
pub fn check_partition_ranges(ranges: &[(Score, Score)]) {
    assert!(!ranges.is_empty(), "No partition");
    assert_eq!(ranges[0].1, Decimal::MAX, "First partition is not the top one");
    assert_eq!(
        ranges[ranges.len() - 1].0,
        Decimal::ZERO,
        "Last partition does not start at zero"
    );

    for (min, max) in ranges.iter() {
        assert!(min < max, "Empty range ({}, {}]", min, max);
    }
    for pair in ranges.windows(2) {
        assert_eq!(
            pair[0].0, pair[1].1,
            "Partitions ({}, {}] and ({}, {}] are not contiguous",
            pair[0].0, pair[0].1, pair[1].0, pair[1].1
        );
    }
}
