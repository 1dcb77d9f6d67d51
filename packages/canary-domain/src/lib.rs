pub mod bucket;
pub mod experiment_key;
pub mod rollout;
pub mod variant;

pub use bucket::{BUCKET_COUNT, bucket, hash_identity};
pub use rollout::{Gate, gate, normalize_percentage, rollout_variant};
pub use variant::{CONTROL, TREATMENT, resolve_variant};
