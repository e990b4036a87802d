//! Feature assembly: price indicators fused with joined sentiment.

pub mod assembler;
pub mod indicators;
pub mod join;
pub mod schema;
pub mod vector;

pub use assembler::{next_returns, FeatureAssembler};
pub use join::join_nearest_preceding;
pub use schema::{FeatureSchema, SchemaFingerprint, SENTIMENT_FIELD, SENTIMENT_MOMENTUM_FIELD};
pub use vector::FeatureVector;
