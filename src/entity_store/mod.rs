mod schema;
mod store;
mod trait_def;

pub use store::SqliteEntityStore;
pub use trait_def::{EntityStore, StoreCounts};
