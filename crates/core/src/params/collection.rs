use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::params::hnsw::{HnswParams, PartialHnswParams};
use crate::params::overlay::Overlay;
use crate::params::quantization::{
    overlay_quantization, MethodDefaults, PartialQuantizationParams, QuantizationParams,
};
use crate::params::vectors::VectorsConfig;

/// Collection-level defaults every vector space inherits from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionDefaults {
    pub hnsw: HnswParams,
    pub quantization: Option<QuantizationParams>,
    pub on_disk_payload: bool,
    /// `Some(0)` disables graph indexing, `None` falls back to `hnsw.full_scan_threshold`.
    pub indexing_threshold: Option<u64>,
}

/// Optimizer settings. Only the indexing threshold is honored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizersConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing_threshold: Option<u64>,
}

/// Optimizer changes in a reconfiguration.
///
/// `indexing_threshold: null` clears the collection's threshold so it is
/// inherited again; an absent field keeps it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizersConfigUpdate {
    #[serde(default, deserialize_with = "present")]
    pub indexing_threshold: Option<Option<u64>>,
}

/// Request to create a collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCollection {
    pub vectors: VectorsConfig,
    #[serde(default)]
    pub hnsw_config: Option<PartialHnswParams>,
    #[serde(default, alias = "quantization")]
    pub quantization_config: Option<PartialQuantizationParams>,
    #[serde(default)]
    pub optimizers_config: Option<OptimizersConfig>,
    #[serde(default)]
    pub on_disk_payload: Option<bool>,
}

impl CreateCollection {
    pub fn new(vectors: VectorsConfig) -> Self {
        Self {
            vectors,
            hnsw_config: None,
            quantization_config: None,
            optimizers_config: None,
            on_disk_payload: None,
        }
    }

    /// Collection defaults produced by this request on top of the built-in defaults.
    pub fn defaults(&self, fallback: &MethodDefaults) -> Result<CollectionDefaults> {
        let mut defaults = CollectionDefaults::default();
        defaults.apply_update(
            &DefaultsUpdate {
                hnsw: self.hnsw_config,
                quantization: self.quantization_config.map(QuantizationUpdate::Params),
                on_disk_payload: self.on_disk_payload,
                indexing_threshold: self
                    .optimizers_config
                    .and_then(|o| o.indexing_threshold)
                    .map(Some),
            },
            fallback,
        )?;
        Ok(defaults)
    }
}

/// Collection-level quantization change: new parameters, or switching quantization off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantizationUpdate {
    Disabled(Disabled),
    Params(PartialQuantizationParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disabled {
    Disabled,
}

/// Partial update of [`CollectionDefaults`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DefaultsUpdate {
    pub hnsw: Option<PartialHnswParams>,
    pub quantization: Option<QuantizationUpdate>,
    pub on_disk_payload: Option<bool>,
    /// `Some(None)` clears the threshold.
    pub indexing_threshold: Option<Option<u64>>,
}

impl DefaultsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(hnsw) = &self.hnsw {
            hnsw.validate()?;
        }
        if let Some(QuantizationUpdate::Params(q)) = &self.quantization {
            q.validate()?;
        }
        Ok(())
    }
}

impl CollectionDefaults {
    /// Apply a partial update. Validates everything before changing anything.
    pub fn apply_update(&mut self, update: &DefaultsUpdate, fallback: &MethodDefaults) -> Result<()> {
        update.validate()?;
        let hnsw = match &update.hnsw {
            Some(partial) => self.hnsw.overlay(partial),
            None => self.hnsw,
        };
        hnsw.validate()?;
        let quantization = match &update.quantization {
            None => self.quantization,
            Some(QuantizationUpdate::Disabled(_)) => None,
            Some(QuantizationUpdate::Params(partial)) => Some(overlay_quantization(
                self.quantization.as_ref(),
                partial,
                fallback,
            )),
        };

        self.hnsw = hnsw;
        self.quantization = quantization;
        if let Some(on_disk_payload) = update.on_disk_payload {
            self.on_disk_payload = on_disk_payload;
        }
        if let Some(threshold) = update.indexing_threshold {
            self.indexing_threshold = threshold;
        }
        Ok(())
    }
}

/// Replacement of one vector space's override blocks.
///
/// An absent block keeps the current override, `null` removes it, an object replaces it wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorSpaceUpdate {
    #[serde(default, deserialize_with = "present")]
    pub hnsw_config: Option<Option<PartialHnswParams>>,
    #[serde(default, alias = "quantization", deserialize_with = "present")]
    pub quantization_config: Option<Option<PartialQuantizationParams>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionParamsUpdate {
    #[serde(default)]
    pub on_disk_payload: Option<bool>,
}

/// Request to reconfigure a collection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionUpdate {
    #[serde(default)]
    pub vectors: BTreeMap<String, VectorSpaceUpdate>,
    #[serde(default)]
    pub hnsw_config: Option<PartialHnswParams>,
    #[serde(default, alias = "quantization")]
    pub quantization_config: Option<QuantizationUpdate>,
    #[serde(default)]
    pub optimizers_config: Option<OptimizersConfigUpdate>,
    #[serde(default)]
    pub params: Option<CollectionParamsUpdate>,
}

impl CollectionUpdate {
    pub fn defaults_update(&self) -> DefaultsUpdate {
        DefaultsUpdate {
            hnsw: self.hnsw_config,
            quantization: self.quantization_config,
            on_disk_payload: self.params.and_then(|p| p.on_disk_payload),
            indexing_threshold: self.optimizers_config.and_then(|o| o.indexing_threshold),
        }
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().count() > crate::config::MAX_COLLECTION_NAME_LEN {
        return Err(Error::InvalidRequest(format!(
            "collection name must be 1..={} characters",
            crate::config::MAX_COLLECTION_NAME_LEN
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidRequest(
            "collection name contains forbidden characters".into(),
        ));
    }
    Ok(())
}
