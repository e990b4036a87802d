//! Persisted model state: a versioned JSON document.
//!
//! Loading refuses an artifact built for a different feature schema
//! (`SchemaMismatch`); a missing, unreadable, corrupt, or tampered file is
//! `ModelUnavailable`. The stored model version doubles as a checksum over
//! the weights.

use super::ridge::{RidgeEnsemble, RidgeMember};
use super::ForecastModel;
use crate::error::ForecastError;
use crate::features::{FeatureSchema, SchemaFingerprint};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model_version: String,
    pub name: String,
    pub schema_version: u32,
    pub schema_fingerprint: SchemaFingerprint,
    pub feature_names: Vec<String>,
    pub window_len: usize,
    pub members: Vec<RidgeMember>,
}

impl From<&RidgeEnsemble> for ModelArtifact {
    fn from(model: &RidgeEnsemble) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model_version: model.version().to_string(),
            name: model.name().to_string(),
            schema_version: model.schema_version().unwrap_or_default(),
            schema_fingerprint: model.schema_fingerprint().clone(),
            feature_names: model.feature_names().to_vec(),
            window_len: model.window_len(),
            members: model.members().to_vec(),
        }
    }
}

impl ModelArtifact {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForecastError> {
        let path = path.as_ref();
        let write_err = |source: std::io::Error| ForecastError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.into()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, json).map_err(write_err)?;
        tracing::info!(path = %path.display(), version = %self.model_version, "saved model artifact");
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::unavailable(format!("cannot read model artifact {}: {e}", path.display()))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            ForecastError::unavailable(format!("corrupt model artifact {}: {e}", path.display()))
        })
    }

    /// Rebuild the model, refusing a schema or checksum mismatch.
    pub fn into_model(self, schema: &FeatureSchema) -> Result<RidgeEnsemble, ForecastError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ForecastError::unavailable(format!(
                "unsupported artifact format {} (expected {ARTIFACT_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.schema_version != schema.version {
            return Err(ForecastError::SchemaMismatch {
                expected: format!("schema version {}", schema.version),
                found: format!("schema version {}", self.schema_version),
            });
        }
        let expected = schema.fingerprint();
        if self.schema_fingerprint != expected || self.feature_names != schema.field_names() {
            return Err(ForecastError::SchemaMismatch {
                expected: format!("fingerprint {expected}"),
                found: format!("fingerprint {}", self.schema_fingerprint),
            });
        }

        let model = RidgeEnsemble::from_parts(
            &self.name,
            self.schema_version,
            self.schema_fingerprint,
            self.feature_names,
            self.window_len,
            self.members,
        )
        .map_err(|e| ForecastError::unavailable(format!("invalid model artifact: {e}")))?;
        if model.version().as_str() != self.model_version {
            return Err(ForecastError::unavailable(format!(
                "artifact checksum mismatch: recorded {}, weights hash to {}",
                self.model_version,
                model.version()
            )));
        }
        Ok(model)
    }

    /// One-time load for a deployment configured with `schema`.
    pub fn load(path: impl AsRef<Path>, schema: &FeatureSchema) -> Result<RidgeEnsemble, ForecastError> {
        let path = path.as_ref();
        let model = Self::read(path)?.into_model(schema)?;
        tracing::info!(
            path = %path.display(),
            version = %model.version(),
            window_len = model.window_len(),
            "loaded forecast model"
        );
        Ok(model)
    }
}
