//! Per-collection catalog of named vector spaces.

use std::collections::HashMap;

use crate::config;
use crate::error::{Error, Result};
use crate::hnsw::Distance;
use crate::params::{PartialHnswParams, PartialQuantizationParams};

/// Declaration of one vector space: shape, metric and optional override blocks.
///
/// `size` and `distance` are fixed for the life of the space.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSpaceSchema {
    pub name: String,
    pub size: u32,
    pub distance: Distance,
    pub hnsw_overrides: Option<PartialHnswParams>,
    pub quantization_overrides: Option<PartialQuantizationParams>,
}

impl VectorSpaceSchema {
    pub fn new(name: impl Into<String>, size: u32, distance: Distance) -> Self {
        Self {
            name: name.into(),
            size,
            distance,
            hnsw_overrides: None,
            quantization_overrides: None,
        }
    }

    pub fn with_hnsw(mut self, hnsw: PartialHnswParams) -> Self {
        self.hnsw_overrides = Some(hnsw);
        self
    }

    pub fn with_quantization(mut self, quantization: PartialQuantizationParams) -> Self {
        self.quantization_overrides = Some(quantization);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.len() > config::MAX_VECTOR_NAME_LEN {
            return Err(Error::InvalidSchema(format!(
                "vector space name longer than {} bytes",
                config::MAX_VECTOR_NAME_LEN
            )));
        }
        if self.size == 0 || self.size > config::MAX_DIMENSION {
            return Err(Error::InvalidSchema(format!(
                "vector space '{}' size must be between 1 and {}, got {}",
                self.name,
                config::MAX_DIMENSION,
                self.size
            )));
        }
        if let Some(hnsw) = &self.hnsw_overrides {
            hnsw.validate()?;
        }
        if let Some(quantization) = &self.quantization_overrides {
            quantization.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    schema: VectorSpaceSchema,
    override_version: u64,
}

/// Ordered set of vector space declarations with per-space override versions.
#[derive(Debug, Clone, Default)]
pub struct VectorSpaceRegistry {
    entries: Vec<RegistryEntry>,
    positions: HashMap<String, usize>,
}

impl VectorSpaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: VectorSpaceSchema) -> Result<()> {
        schema.validate()?;
        if self.positions.contains_key(&schema.name) {
            return Err(Error::DuplicateVectorSpace(schema.name));
        }
        self.positions.insert(schema.name.clone(), self.entries.len());
        self.entries.push(RegistryEntry {
            schema,
            override_version: 0,
        });
        Ok(())
    }

    /// Register a batch of schemas. Nothing is inserted unless the whole batch is valid.
    pub fn register_all(&mut self, schemas: Vec<VectorSpaceSchema>) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for schema in &schemas {
            schema.validate()?;
            if self.positions.contains_key(&schema.name) || !seen.insert(schema.name.as_str()) {
                return Err(Error::DuplicateVectorSpace(schema.name.clone()));
            }
        }
        for schema in schemas {
            self.register(schema)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&VectorSpaceSchema> {
        self.positions.get(name).map(|&i| &self.entries[i].schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Number of override replacements applied to `name` so far.
    pub fn override_version(&self, name: &str) -> Option<u64> {
        self.positions
            .get(name)
            .map(|&i| self.entries[i].override_version)
    }

    /// Schemas in declaration order.
    pub fn list(&self) -> impl Iterator<Item = &VectorSpaceSchema> + '_ {
        self.entries.iter().map(|e| &e.schema)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace both override blocks of `name` wholesale and bump its override version.
    pub fn update_overrides(
        &mut self,
        name: &str,
        hnsw: Option<PartialHnswParams>,
        quantization: Option<PartialQuantizationParams>,
    ) -> Result<()> {
        let &idx = self
            .positions
            .get(name)
            .ok_or_else(|| Error::UnknownVectorSpace(name.to_string()))?;
        if let Some(hnsw) = &hnsw {
            hnsw.validate()?;
        }
        if let Some(quantization) = &quantization {
            quantization.validate()?;
        }
        let entry = &mut self.entries[idx];
        entry.schema.hnsw_overrides = hnsw;
        entry.schema.quantization_overrides = quantization;
        entry.override_version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> VectorSpaceRegistry {
        let mut reg = VectorSpaceRegistry::new();
        reg.register_all(vec![
            VectorSpaceSchema::new("image", 4, Distance::Dot),
            VectorSpaceSchema::new("audio", 4, Distance::Dot),
            VectorSpaceSchema::new("text", 8, Distance::Cosine),
        ])
        .unwrap();
        reg
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let names: Vec<_> = registry().list().map(|s| s.name.clone()).collect();
        assert_eq!(names, ["image", "audio", "text"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut reg = registry();
        let err = reg.register(VectorSpaceSchema::new("text", 3, Distance::Euclid));
        assert_eq!(err, Err(Error::DuplicateVectorSpace("text".into())));
        assert_eq!(reg.get("text").unwrap().size, 8);
    }

    #[test]
    fn test_register_all_is_atomic() {
        let mut reg = VectorSpaceRegistry::new();
        let err = reg.register_all(vec![
            VectorSpaceSchema::new("a", 4, Distance::Dot),
            VectorSpaceSchema::new("b", 4, Distance::Dot),
            VectorSpaceSchema::new("a", 2, Distance::Dot),
        ]);
        assert!(matches!(err, Err(Error::DuplicateVectorSpace(_))));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut reg = VectorSpaceRegistry::new();
        let err = reg.register(VectorSpaceSchema::new("empty", 0, Distance::Dot));
        assert!(matches!(err, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_update_overrides_replaces_wholesale() {
        let mut reg = registry();
        reg.update_overrides(
            "image",
            Some(PartialHnswParams {
                m: Some(20),
                ..Default::default()
            }),
            None,
        )
        .unwrap();
        assert_eq!(reg.override_version("image"), Some(1));
        reg.update_overrides(
            "image",
            Some(PartialHnswParams {
                ef_construct: Some(64),
                ..Default::default()
            }),
            None,
        )
        .unwrap();
        let hnsw = reg.get("image").unwrap().hnsw_overrides.unwrap();
        assert_eq!(hnsw.m, None);
        assert_eq!(hnsw.ef_construct, Some(64));
        assert_eq!(reg.override_version("image"), Some(2));
        assert_eq!(reg.override_version("audio"), Some(0));
    }

    #[test]
    fn test_update_unknown_space() {
        let mut reg = registry();
        assert_eq!(
            reg.update_overrides("video", None, None),
            Err(Error::UnknownVectorSpace("video".into()))
        );
    }
}
