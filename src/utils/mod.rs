pub mod stats;

pub use stats::{mean, median, population_std_dev, round_to, weekly_buckets};
