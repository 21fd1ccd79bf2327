mod recommender;
mod seed;

pub use recommender::{Recommendation, Recommender};
pub use seed::{Seed, SeedBuilder, ToleranceWindow};
