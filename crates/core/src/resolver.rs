//! Resolution of the effective index configuration of a vector space.
//!
//! The effective configuration is always derived, never stored as primary state:
//! collection defaults overlaid with the space's declared overrides. Size and
//! distance are never part of it; they belong to the schema alone.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config;
use crate::params::quantization::overlay_quantization;
use crate::params::{merge, CollectionDefaults, HnswParams, MethodDefaults, QuantizationParams};
use crate::registry::{VectorSpaceRegistry, VectorSpaceSchema};

/// Point count at which a segment switches from flat scan to a graph index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexingThreshold {
    /// Graph indexing is switched off; segments always scan.
    Disabled,
    Points(u64),
}

impl IndexingThreshold {
    fn from_config(configured: Option<u64>, hnsw: &HnswParams) -> Self {
        match configured {
            Some(0) => IndexingThreshold::Disabled,
            Some(points) => IndexingThreshold::Points(points),
            None => IndexingThreshold::Points(u64::from(hnsw.full_scan_threshold)),
        }
    }
}

/// Versions of the two inputs an effective config was derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigGeneration {
    pub defaults_version: u64,
    pub override_version: u64,
}

/// Fully resolved parameters of one vector space.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub hnsw: HnswParams,
    pub quantization: Option<QuantizationParams>,
    pub indexing_threshold: IndexingThreshold,
    pub generation: ConfigGeneration,
}

/// Process-wide fallbacks, passed in explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverDefaults {
    /// Parameters for a quantization method the collection does not configure.
    pub quantization: MethodDefaults,
    /// Indexing threshold used when the collection does not set one.
    pub indexing_threshold: Option<u64>,
    /// Fraction of the threshold a ready graph may shrink below it before going stale.
    pub hysteresis_ratio: f64,
}

impl Default for ResolverDefaults {
    fn default() -> Self {
        Self {
            quantization: MethodDefaults::default(),
            indexing_threshold: None,
            hysteresis_ratio: config::INDEXING_HYSTERESIS_RATIO,
        }
    }
}

/// Indexing threshold together with its demotion margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdPolicy {
    pub threshold: IndexingThreshold,
    pub margin: u64,
}

#[derive(Debug)]
pub struct EffectiveConfigResolver {
    defaults: ResolverDefaults,
    cache: Mutex<HashMap<String, Arc<EffectiveConfig>>>,
}

impl EffectiveConfigResolver {
    pub fn new(defaults: ResolverDefaults) -> Self {
        Self {
            defaults,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn defaults(&self) -> &ResolverDefaults {
        &self.defaults
    }

    /// Resolve the effective configuration of `schema`. Pure and deterministic.
    pub fn resolve(&self, collection: &CollectionDefaults, schema: &VectorSpaceSchema) -> EffectiveConfig {
        let hnsw = merge(&collection.hnsw, schema.hnsw_overrides.as_ref());
        let quantization = match &schema.quantization_overrides {
            None => collection.quantization,
            Some(partial) => Some(overlay_quantization(
                collection.quantization.as_ref(),
                partial,
                &self.defaults.quantization,
            )),
        };
        let configured = collection
            .indexing_threshold
            .or(self.defaults.indexing_threshold);
        EffectiveConfig {
            hnsw,
            quantization,
            indexing_threshold: IndexingThreshold::from_config(configured, &hnsw),
            generation: ConfigGeneration::default(),
        }
    }

    /// Resolve through the cache. An entry is reused only for the same generation.
    pub fn resolve_cached(
        &self,
        collection: &CollectionDefaults,
        defaults_version: u64,
        registry: &VectorSpaceRegistry,
        schema: &VectorSpaceSchema,
    ) -> Arc<EffectiveConfig> {
        let generation = ConfigGeneration {
            defaults_version,
            override_version: registry.override_version(&schema.name).unwrap_or_default(),
        };
        let mut cache = self.cache.lock();
        if let Some(hit) = cache.get(&schema.name) {
            if hit.generation == generation {
                return Arc::clone(hit);
            }
        }
        let resolved = Arc::new(EffectiveConfig {
            generation,
            ..self.resolve(collection, schema)
        });
        cache.insert(schema.name.clone(), Arc::clone(&resolved));
        resolved
    }

    pub fn invalidate(&self, name: &str) {
        self.cache.lock().remove(name);
    }

    pub fn invalidate_all(&self) {
        self.cache.lock().clear();
    }

    /// Demotion margin for a threshold: `ceil(threshold * hysteresis_ratio)`.
    pub fn hysteresis_margin(&self, threshold: u64) -> u64 {
        (threshold as f64 * self.defaults.hysteresis_ratio).ceil() as u64
    }

    pub fn policy(&self, config: &EffectiveConfig) -> ThresholdPolicy {
        let margin = match config.indexing_threshold {
            IndexingThreshold::Disabled => 0,
            IndexingThreshold::Points(t) => self.hysteresis_margin(t),
        };
        ThresholdPolicy {
            threshold: config.indexing_threshold,
            margin,
        }
    }
}

/// Effective configs of every space of a collection, taken under one config snapshot.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSpaces {
    configs: HashMap<String, (Arc<EffectiveConfig>, ThresholdPolicy)>,
}

impl ResolvedSpaces {
    pub fn insert(&mut self, name: String, config: Arc<EffectiveConfig>, policy: ThresholdPolicy) {
        self.configs.insert(name, (config, policy));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EffectiveConfig>> {
        self.configs.get(name).map(|(config, _)| config)
    }

    pub fn policy(&self, name: &str) -> Option<ThresholdPolicy> {
        self.configs.get(name).map(|(_, policy)| *policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::Distance;
    use crate::params::{
        CompressionRatio, PartialHnswParams, PartialProductQuantization,
        PartialQuantizationParams, PartialScalarQuantization, ProductQuantization,
        ScalarQuantization, ScalarType,
    };

    fn collection() -> CollectionDefaults {
        CollectionDefaults {
            hnsw: HnswParams {
                m: 10,
                ef_construct: 80,
                ..HnswParams::default()
            },
            quantization: Some(QuantizationParams::Scalar(ScalarQuantization {
                kind: ScalarType::Int8,
                quantile: 0.5,
                always_ram: false,
            })),
            ..CollectionDefaults::default()
        }
    }

    fn resolver() -> EffectiveConfigResolver {
        EffectiveConfigResolver::new(ResolverDefaults::default())
    }

    #[test]
    fn test_no_overrides_inherits_collection() {
        let schema = VectorSpaceSchema::new("plain", 4, Distance::Dot);
        let eff = resolver().resolve(&collection(), &schema);
        assert_eq!(eff.hnsw, collection().hnsw);
        assert_eq!(eff.quantization, collection().quantization);
    }

    #[test]
    fn test_override_precedence_per_field() {
        let schema = VectorSpaceSchema::new("image", 4, Distance::Dot).with_hnsw(PartialHnswParams {
            m: Some(20),
            ..Default::default()
        });
        let eff = resolver().resolve(&collection(), &schema);
        assert_eq!(eff.hnsw.m, 20);
        assert_eq!(eff.hnsw.ef_construct, 80);
    }

    #[test]
    fn test_quantization_partial_inherits_same_method_fields() {
        let schema = VectorSpaceSchema::new("text", 8, Distance::Cosine).with_quantization(
            PartialQuantizationParams::Scalar(PartialScalarQuantization {
                kind: Some(ScalarType::Int8),
                always_ram: Some(true),
                ..Default::default()
            }),
        );
        let eff = resolver().resolve(&collection(), &schema);
        assert_eq!(
            eff.quantization,
            Some(QuantizationParams::Scalar(ScalarQuantization {
                kind: ScalarType::Int8,
                quantile: 0.5,
                always_ram: true,
            }))
        );
    }

    #[test]
    fn test_quantization_other_method_ignores_collection_block() {
        let schema = VectorSpaceSchema::new("pq", 8, Distance::Euclid).with_quantization(
            PartialQuantizationParams::Product(PartialProductQuantization {
                always_ram: Some(true),
                ..Default::default()
            }),
        );
        let eff = resolver().resolve(&collection(), &schema);
        assert_eq!(
            eff.quantization,
            Some(QuantizationParams::Product(ProductQuantization {
                compression: CompressionRatio::X16,
                always_ram: true,
            }))
        );
    }

    #[test]
    fn test_quantization_independent_between_spaces() {
        let with = VectorSpaceSchema::new("audio", 4, Distance::Dot).with_quantization(
            PartialQuantizationParams::Scalar(PartialScalarQuantization {
                quantile: Some(0.6),
                ..Default::default()
            }),
        );
        let without = VectorSpaceSchema::new("image", 4, Distance::Dot);
        let mut bare = collection();
        bare.quantization = None;
        let r = resolver();
        assert!(r.resolve(&bare, &with).quantization.is_some());
        assert!(r.resolve(&bare, &without).quantization.is_none());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let schema = VectorSpaceSchema::new("image", 4, Distance::Dot).with_hnsw(PartialHnswParams {
            m: Some(20),
            ..Default::default()
        });
        let r = resolver();
        assert_eq!(r.resolve(&collection(), &schema), r.resolve(&collection(), &schema));
    }

    #[test]
    fn test_threshold_resolution() {
        let schema = VectorSpaceSchema::new("v", 4, Distance::Dot);
        let r = resolver();
        let mut defaults = collection();
        assert_eq!(
            r.resolve(&defaults, &schema).indexing_threshold,
            IndexingThreshold::Points(10_000)
        );
        defaults.indexing_threshold = Some(0);
        assert_eq!(
            r.resolve(&defaults, &schema).indexing_threshold,
            IndexingThreshold::Disabled
        );
        defaults.indexing_threshold = Some(1_000);
        let eff = r.resolve(&defaults, &schema);
        assert_eq!(eff.indexing_threshold, IndexingThreshold::Points(1_000));
        assert_eq!(r.policy(&eff).margin, 100);
    }

    #[test]
    fn test_process_default_threshold_applies_when_collection_silent() {
        let r = EffectiveConfigResolver::new(ResolverDefaults {
            indexing_threshold: Some(500),
            ..ResolverDefaults::default()
        });
        let schema = VectorSpaceSchema::new("v", 4, Distance::Dot);
        assert_eq!(
            r.resolve(&collection(), &schema).indexing_threshold,
            IndexingThreshold::Points(500)
        );
    }

    #[test]
    fn test_cache_respects_generation() {
        let mut registry = VectorSpaceRegistry::new();
        registry
            .register(VectorSpaceSchema::new("image", 4, Distance::Dot))
            .unwrap();
        let r = resolver();
        let first = r.resolve_cached(&collection(), 0, &registry, registry.get("image").unwrap());
        let again = r.resolve_cached(&collection(), 0, &registry, registry.get("image").unwrap());
        assert!(Arc::ptr_eq(&first, &again));

        registry
            .update_overrides(
                "image",
                Some(PartialHnswParams {
                    m: Some(32),
                    ..Default::default()
                }),
                None,
            )
            .unwrap();
        let updated = r.resolve_cached(&collection(), 0, &registry, registry.get("image").unwrap());
        assert_eq!(updated.hnsw.m, 32);
        assert_eq!(updated.generation.override_version, 1);
        assert_ne!(first.generation, updated.generation);
    }
}
