//! Model export and serialization module
//!
//! Provides the persisted training artifacts:
//! - Model file (metadata + fitted preprocessing and classifier), JSON
//! - Feature manifest (ordered raw columns), JSON

mod serializer;

pub use serializer::{
    load_json, manifest_path_for, save_json, FeatureManifest, ModelArtifact, ModelMetadata,
};
