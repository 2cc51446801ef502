use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{Error, Result};
use crate::params::overlay::impl_overlay;

/// Fully resolved HNSW graph parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HnswParams {
    /// Number of bidirectional links per node (layer 0 uses `2 * m`).
    pub m: u32,
    /// Candidate list size during index construction.
    pub ef_construct: u32,
    /// Live point count below which searches use a flat scan even when a graph is ready.
    pub full_scan_threshold: u32,
    /// Maximum number of layers in the graph.
    pub max_layers: u32,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            ef_construct: config::HNSW_DEFAULT_EF_CONSTRUCT,
            full_scan_threshold: config::HNSW_DEFAULT_FULL_SCAN_THRESHOLD,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
        }
    }
}

/// HNSW parameter overrides. Absent fields are inherited and never serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialHnswParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_construct: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_scan_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_layers: Option<u32>,
}

impl_overlay!(HnswParams => PartialHnswParams {
    m,
    ef_construct,
    full_scan_threshold,
    max_layers,
});

impl HnswParams {
    pub fn validate(&self) -> Result<()> {
        check_range("m", self.m, &config::HNSW_M_RANGE)?;
        check_range("ef_construct", self.ef_construct, &config::HNSW_EF_CONSTRUCT_RANGE)?;
        check_range("max_layers", self.max_layers, &config::HNSW_MAX_LAYERS_RANGE)
    }
}

impl PartialHnswParams {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validates the fields that are present.
    pub fn validate(&self) -> Result<()> {
        if let Some(m) = self.m {
            check_range("m", m, &config::HNSW_M_RANGE)?;
        }
        if let Some(ef) = self.ef_construct {
            check_range("ef_construct", ef, &config::HNSW_EF_CONSTRUCT_RANGE)?;
        }
        if let Some(layers) = self.max_layers {
            check_range("max_layers", layers, &config::HNSW_MAX_LAYERS_RANGE)?;
        }
        Ok(())
    }
}

fn check_range(field: &str, value: u32, range: &std::ops::RangeInclusive<u32>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidHnswParams(format!(
            "{field} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::overlay::Overlay;

    #[test]
    fn test_overlay_keeps_absent_fields() {
        let base = HnswParams {
            m: 10,
            ef_construct: 80,
            ..HnswParams::default()
        };
        let merged = base.overlay(&PartialHnswParams {
            m: Some(20),
            ..Default::default()
        });
        assert_eq!(merged.m, 20);
        assert_eq!(merged.ef_construct, 80);
        assert_eq!(merged.full_scan_threshold, config::HNSW_DEFAULT_FULL_SCAN_THRESHOLD);
    }

    #[test]
    fn test_partial_serializes_only_present_fields() {
        let partial = PartialHnswParams {
            ef_construct: Some(100),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(partial).unwrap(),
            serde_json::json!({"ef_construct": 100})
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = serde_json::from_str::<PartialHnswParams>(r#"{"m": 8, "bogus": 1}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_validation_ranges() {
        assert!(HnswParams::default().validate().is_ok());
        let bad = PartialHnswParams {
            m: Some(1),
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(Error::InvalidHnswParams(_))));
    }
}
