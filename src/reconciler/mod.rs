mod reconciler;
mod retry_policy;

pub use reconciler::{Reconciler, Resolution, SearchResults};
pub use retry_policy::RetryPolicy;
