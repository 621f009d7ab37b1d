use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};
use rust_decimal::Decimal;

use leaderboard_index::base::{CustomerId, Score};

pub struct TestCustomer {
    pub id: CustomerId,
    pub score: Score,
}

/// How initial scores are drawn; all scores are positive, with one
/// fractional digit, and at most 1000
#[derive(Clone, Copy)]
pub enum ScoreDistribution {
    /// Uniform on (0, 1000]
    Uniform,
    /// Normal with the given mean and standard deviation, clamped
    Normal(f64, f64),
}

fn rng_from(seed: Option<u64>) -> StdRng {
    if let Some(seed) = seed {
        StdRng::seed_from_u64(seed)
    } else {
        StdRng::from_entropy()
    }
}

/// Creates `count` customers with consecutive IDs
pub fn create_customers(
    count: usize,
    distribution: ScoreDistribution,
    seed: Option<u64>,
) -> Vec<TestCustomer> {
    let mut rng = rng_from(seed);
    let start_id: CustomerId = rng.gen_range(1..CustomerId::MAX / 2);

    let tenths = Uniform::new_inclusive(1i64, 10_000);
    let mut customers = Vec::with_capacity(count);

    for ix in 0..count {
        let score = match distribution {
            ScoreDistribution::Uniform => tenths.sample(&mut rng),
            ScoreDistribution::Normal(mean, std_dev) => {
                let normal = Normal::new(mean, std_dev).unwrap();
                ((normal.sample(&mut rng) * 10.).round() as i64).clamp(1, 10_000)
            }
        };

        customers.push(TestCustomer {
            id: start_id + ix as CustomerId,
            score: Decimal::new(score, 1),
        });
    }

    customers
}
