mod features;
mod models;
mod validation;

pub use features::{AudioFeatures, FeatureDimension};
pub use models::*;
pub use validation::{normalize_external_ids, validate_external_id, EXTERNAL_ID_LEN};
