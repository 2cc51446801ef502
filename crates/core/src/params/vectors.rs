//! Declared vector spaces as they appear in requests and in collection info.
//!
//! A collection declares either a single unnamed vector (`{"size": .., "distance": ..}`)
//! or a map of named spaces. Map order is the declaration order and is preserved
//! through deserialization and serialization.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hnsw::Distance;
use crate::params::hnsw::PartialHnswParams;
use crate::params::quantization::PartialQuantizationParams;
use crate::registry::VectorSpaceSchema;

/// Name of the vector space declared by the single-vector form.
pub const DEFAULT_VECTOR_NAME: &str = "";

/// Declaration of one vector space. Override blocks are kept exactly as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorParams {
    pub size: u32,
    pub distance: Distance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hnsw_config: Option<PartialHnswParams>,
    #[serde(default, alias = "quantization", skip_serializing_if = "Option::is_none")]
    pub quantization_config: Option<PartialQuantizationParams>,
}

impl VectorParams {
    pub fn new(size: u32, distance: Distance) -> Self {
        Self {
            size,
            distance,
            hnsw_config: None,
            quantization_config: None,
        }
    }

    pub fn into_schema(self, name: impl Into<String>) -> VectorSpaceSchema {
        VectorSpaceSchema {
            name: name.into(),
            size: self.size,
            distance: self.distance,
            hnsw_overrides: self.hnsw_config,
            quantization_overrides: self.quantization_config,
        }
    }
}

impl From<&VectorSpaceSchema> for VectorParams {
    fn from(schema: &VectorSpaceSchema) -> Self {
        Self {
            size: schema.size,
            distance: schema.distance,
            hnsw_config: schema.hnsw_overrides,
            quantization_config: schema.quantization_overrides,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VectorsConfig {
    Single(VectorParams),
    Multi(Vec<(String, VectorParams)>),
}

impl VectorsConfig {
    pub fn into_schemas(self) -> Vec<VectorSpaceSchema> {
        match self {
            VectorsConfig::Single(params) => vec![params.into_schema(DEFAULT_VECTOR_NAME)],
            VectorsConfig::Multi(spaces) => spaces
                .into_iter()
                .map(|(name, params)| params.into_schema(name))
                .collect(),
        }
    }

    /// The single-vector form is used when the only space is the unnamed one.
    pub fn from_schemas<'a>(schemas: impl IntoIterator<Item = &'a VectorSpaceSchema>) -> Self {
        let spaces: Vec<(String, VectorParams)> = schemas
            .into_iter()
            .map(|s| (s.name.clone(), VectorParams::from(s)))
            .collect();
        match spaces.as_slice() {
            [(name, params)] if name == DEFAULT_VECTOR_NAME => VectorsConfig::Single(params.clone()),
            _ => VectorsConfig::Multi(spaces),
        }
    }
}

impl Serialize for VectorsConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            VectorsConfig::Single(params) => params.serialize(serializer),
            VectorsConfig::Multi(spaces) => {
                serializer.collect_map(spaces.iter().map(|(name, params)| (name, params)))
            }
        }
    }
}

impl<'de> Deserialize<'de> for VectorsConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(VectorsConfigVisitor)
    }
}

struct VectorsConfigVisitor;

impl<'de> Visitor<'de> for VectorsConfigVisitor {
    type Value = VectorsConfig;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("vector params or a map of vector space name to vector params")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries: Vec<(String, serde_json::Value)> = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, serde_json::Value>()? {
            entries.push((key, value));
        }

        if entries.iter().any(|(key, _)| key == "size") {
            let object: serde_json::Map<String, serde_json::Value> = entries.into_iter().collect();
            return serde_json::from_value(serde_json::Value::Object(object))
                .map(VectorsConfig::Single)
                .map_err(de::Error::custom);
        }

        let mut spaces = Vec::with_capacity(entries.len());
        for (name, value) in entries {
            let params: VectorParams = serde_json::from_value(value)
                .map_err(|e| de::Error::custom(format!("vector space '{name}': {e}")))?;
            spaces.push((name, params));
        }
        Ok(VectorsConfig::Multi(spaces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_spaces_keep_declaration_order() {
        let input = r#"{"zeta": {"size": 2, "distance": "Dot"}, "alpha": {"size": 3, "distance": "Cosine"}, "mid": {"size": 1, "distance": "Euclid"}}"#;
        let config: VectorsConfig = serde_json::from_str(input).unwrap();
        let names: Vec<_> = config
            .clone()
            .into_schemas()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        let out = serde_json::to_string(&config).unwrap();
        assert!(out.find("zeta").unwrap() < out.find("alpha").unwrap());
        assert!(out.find("alpha").unwrap() < out.find("mid").unwrap());
    }

    #[test]
    fn test_single_form() {
        let config: VectorsConfig =
            serde_json::from_value(json!({"size": 4, "distance": "Cosine"})).unwrap();
        assert_eq!(config, VectorsConfig::Single(VectorParams::new(4, Distance::Cosine)));
        let schemas = config.into_schemas();
        assert_eq!(schemas[0].name, DEFAULT_VECTOR_NAME);
        assert_eq!(
            VectorsConfig::from_schemas(&schemas),
            VectorsConfig::Single(VectorParams::new(4, Distance::Cosine))
        );
    }

    #[test]
    fn test_declared_overrides_echo_exactly() {
        let input = json!({
            "image": {"size": 4, "distance": "Dot", "hnsw_config": {"m": 20}},
            "text": {"size": 8, "distance": "Cosine",
                     "quantization_config": {"scalar": {"type": "int8", "always_ram": true}}}
        });
        let config: VectorsConfig = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(&config).unwrap(), input);
    }

    #[test]
    fn test_unknown_field_in_space_rejected() {
        let err = serde_json::from_value::<VectorsConfig>(
            json!({"image": {"size": 4, "distance": "Dot", "colour": "red"}}),
        );
        assert!(err.is_err());
    }
}
