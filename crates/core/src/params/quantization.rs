use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{Error, Result};
use crate::params::overlay::{impl_overlay, Overlay};

/// Element type of scalar-quantized codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    #[default]
    Int8,
}

/// Ratio between full-precision size and product-quantized size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionRatio {
    X4,
    X8,
    #[default]
    X16,
    X32,
    X64,
}

impl CompressionRatio {
    /// Number of f32 components folded into one byte code.
    pub fn floats_per_code(self) -> usize {
        match self {
            CompressionRatio::X4 => 1,
            CompressionRatio::X8 => 2,
            CompressionRatio::X16 => 4,
            CompressionRatio::X32 => 8,
            CompressionRatio::X64 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalarQuantization {
    #[serde(rename = "type")]
    pub kind: ScalarType,
    /// Central share of each vector's values that keeps full code resolution.
    pub quantile: f32,
    /// Keep full-precision vectors in RAM next to the codes.
    pub always_ram: bool,
}

impl Default for ScalarQuantization {
    fn default() -> Self {
        Self {
            kind: ScalarType::Int8,
            quantile: config::SCALAR_DEFAULT_QUANTILE,
            always_ram: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialScalarQuantization {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ScalarType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantile: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_ram: Option<bool>,
}

impl_overlay!(ScalarQuantization => PartialScalarQuantization { kind, quantile, always_ram });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductQuantization {
    pub compression: CompressionRatio,
    pub always_ram: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialProductQuantization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_ram: Option<bool>,
}

impl_overlay!(ProductQuantization => PartialProductQuantization { compression, always_ram });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantizationMethod {
    Scalar,
    Product,
}

/// Fully resolved quantization block, tagged by method: `{"scalar": {...}}` or `{"product": {...}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizationParams {
    Scalar(ScalarQuantization),
    Product(ProductQuantization),
}

/// Quantization override block. The method tag is mandatory, inner fields are optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialQuantizationParams {
    Scalar(PartialScalarQuantization),
    Product(PartialProductQuantization),
}

impl QuantizationParams {
    pub fn method(&self) -> QuantizationMethod {
        match self {
            QuantizationParams::Scalar(_) => QuantizationMethod::Scalar,
            QuantizationParams::Product(_) => QuantizationMethod::Product,
        }
    }

    pub fn always_ram(&self) -> bool {
        match self {
            QuantizationParams::Scalar(s) => s.always_ram,
            QuantizationParams::Product(p) => p.always_ram,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            QuantizationParams::Scalar(s) => validate_quantile(s.quantile),
            QuantizationParams::Product(_) => Ok(()),
        }
    }
}

impl PartialQuantizationParams {
    pub fn method(&self) -> QuantizationMethod {
        match self {
            PartialQuantizationParams::Scalar(_) => QuantizationMethod::Scalar,
            PartialQuantizationParams::Product(_) => QuantizationMethod::Product,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PartialQuantizationParams::Scalar(s) => s.quantile.map_or(Ok(()), validate_quantile),
            PartialQuantizationParams::Product(_) => Ok(()),
        }
    }
}

fn validate_quantile(quantile: f32) -> Result<()> {
    if quantile.is_finite() && quantile > 0.0 && quantile <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidQuantizationParams(format!(
            "quantile must be in (0, 1], got {quantile}"
        )))
    }
}

/// Per-method parameters used when an override names a method the base block does not use.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MethodDefaults {
    pub scalar: ScalarQuantization,
    pub product: ProductQuantization,
}

impl MethodDefaults {
    pub fn for_method(&self, method: QuantizationMethod) -> QuantizationParams {
        match method {
            QuantizationMethod::Scalar => QuantizationParams::Scalar(self.scalar),
            QuantizationMethod::Product => QuantizationParams::Product(self.product),
        }
    }
}

impl Overlay for QuantizationParams {
    type Partial = PartialQuantizationParams;

    /// Merges the inner block field by field when the methods agree; a different
    /// method replaces the block, filling its gaps from the documented defaults.
    fn overlay(&self, partial: &PartialQuantizationParams) -> Self {
        match (self, partial) {
            (QuantizationParams::Scalar(base), PartialQuantizationParams::Scalar(p)) => {
                QuantizationParams::Scalar(base.overlay(p))
            }
            (QuantizationParams::Product(base), PartialQuantizationParams::Product(p)) => {
                QuantizationParams::Product(base.overlay(p))
            }
            (_, other) => MethodDefaults::default().for_method(other.method()).overlay(other),
        }
    }
}

/// Resolve a quantization override against an optional base block.
///
/// Fields missing from `partial` come from `base` when it uses the same method,
/// otherwise from `fallback` for the override's method.
pub fn overlay_quantization(
    base: Option<&QuantizationParams>,
    partial: &PartialQuantizationParams,
    fallback: &MethodDefaults,
) -> QuantizationParams {
    match base {
        Some(base) if base.method() == partial.method() => base.overlay(partial),
        _ => fallback.for_method(partial.method()).overlay(partial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scalar(quantile: f32, always_ram: bool) -> QuantizationParams {
        QuantizationParams::Scalar(ScalarQuantization {
            kind: ScalarType::Int8,
            quantile,
            always_ram,
        })
    }

    #[test]
    fn test_same_method_merges_field_by_field() {
        let base = scalar(0.5, false);
        let partial: PartialQuantizationParams =
            serde_json::from_value(json!({"scalar": {"always_ram": true}})).unwrap();
        let merged = overlay_quantization(Some(&base), &partial, &MethodDefaults::default());
        assert_eq!(merged, scalar(0.5, true));
    }

    #[test]
    fn test_method_mismatch_uses_method_defaults() {
        let base = QuantizationParams::Product(ProductQuantization {
            compression: CompressionRatio::X32,
            always_ram: true,
        });
        let partial: PartialQuantizationParams =
            serde_json::from_value(json!({"scalar": {"quantile": 0.9}})).unwrap();
        let merged = overlay_quantization(Some(&base), &partial, &MethodDefaults::default());
        assert_eq!(merged, scalar(0.9, false));
    }

    #[test]
    fn test_no_base_uses_fallback() {
        let fallback = MethodDefaults {
            product: ProductQuantization {
                compression: CompressionRatio::X8,
                always_ram: false,
            },
            ..Default::default()
        };
        let partial: PartialQuantizationParams =
            serde_json::from_value(json!({"product": {"always_ram": true}})).unwrap();
        let merged = overlay_quantization(None, &partial, &fallback);
        assert_eq!(
            merged,
            QuantizationParams::Product(ProductQuantization {
                compression: CompressionRatio::X8,
                always_ram: true,
            })
        );
    }

    #[test]
    fn test_partial_round_trip_omits_absent_fields() {
        let input = json!({"scalar": {"type": "int8", "always_ram": true}});
        let partial: PartialQuantizationParams = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(partial).unwrap(), input);
    }

    #[test]
    fn test_quantile_validation() {
        let partial: PartialQuantizationParams =
            serde_json::from_value(json!({"scalar": {"quantile": 1.5}})).unwrap();
        assert!(matches!(
            partial.validate(),
            Err(Error::InvalidQuantizationParams(_))
        ));
        assert!(scalar(0.6, false).validate().is_ok());
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(serde_json::from_value::<PartialQuantizationParams>(json!({"binary": {}})).is_err());
    }
}
