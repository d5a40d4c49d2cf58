//! Analysis configuration, read from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bound::NoiseBound;
use crate::error::Result;
use crate::kind::OpKind;
use crate::registry::{NoiseClass, Registry};

/// One entry of the override table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    /// Kind to classify.
    pub kind: OpKind,
    /// Class replacing the built-in one.
    #[serde(flatten)]
    pub class: NoiseClass,
}

/// Fresh-noise model and override table.
///
/// ```json
/// {
///   "fresh_noise": 1,
///   "overrides": [
///     {"kind": "extern:fhe.max_eint", "class": "max"},
///     {"kind": "extern:fhe.mul_eint_int", "class": "custom_binary", "rule": "scalar_mul", "clear_operand": 1}
///   ]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Squared bound of a fresh encryption.
    pub fresh_noise: NoiseBound,
    /// Applied in order; a later entry for the same kind wins.
    pub overrides: Vec<Override>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fresh_noise: NoiseBound::one(),
            overrides: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Parse a config; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse the config at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::from_json(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), overrides = config.overrides.len(), "loaded analysis config");
        Ok(config)
    }

    /// Registry with the configured fresh noise and overrides applied.
    pub fn registry(&self) -> Result<Registry> {
        let mut registry = Registry::new(self.fresh_noise.clone());
        for o in &self.overrides {
            registry.set_override(o.kind.clone(), o.class.clone())?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CustomRule;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::from_json("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        let reg = config.registry().unwrap();
        assert_eq!(reg.fresh_noise(), &NoiseBound::one());
    }

    #[test]
    fn test_overrides() {
        let config = AnalysisConfig::from_json(
            r#"{
                "fresh_noise": "4",
                "overrides": [
                    {"kind": "extern:fhe.max_eint", "class": "max"},
                    {"kind": "extern:fhe.mul", "class": "custom_binary", "rule": "scalar_mul", "clear_operand": 0},
                    {"kind": "tlu", "class": "constant", "bound": 1}
                ]
            }"#,
        )
        .unwrap();
        let reg = config.registry().unwrap();
        assert_eq!(reg.classify(&OpKind::Input).unwrap(), NoiseClass::Constant { bound: NoiseBound::from(4) });
        assert_eq!(reg.classify(&OpKind::Extern("fhe.max_eint".into())).unwrap(), NoiseClass::Max);
        assert_eq!(
            reg.classify(&OpKind::Extern("fhe.mul".into())).unwrap(),
            NoiseClass::CustomBinary { rule: CustomRule::ScalarMul, clear_operand: 0 }
        );
        assert_eq!(reg.classify(&OpKind::Tlu).unwrap(), NoiseClass::Constant { bound: NoiseBound::one() });
    }

    #[test]
    fn test_rejects_unknown_kind() {
        assert!(AnalysisConfig::from_json(r#"{"overrides": [{"kind": "nope", "class": "max"}]}"#).is_err());
    }
}
