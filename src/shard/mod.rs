//! Split-artifact handling: detection of multi-part GGUF files and the
//! metadata fingerprint that identifies a shard set for the merge cache.

mod detect;
mod fingerprint;

pub use detect::{is_split, ShardSet};
