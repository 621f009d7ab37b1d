pub mod customers;
pub mod leaderboard;
