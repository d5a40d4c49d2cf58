//! Noise classification registry: operation kind → noise-growth rule.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bound::NoiseBound;
use crate::error::{Error, Result};
use crate::kind::OpKind;

/// How an operation's output bound derives from its operand bounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum NoiseClass {
    /// Fixed bound regardless of operands.
    Constant {
        /// The bound every result gets.
        bound: NoiseBound,
    },
    /// Noise reset to nothing.
    Zero,
    /// Sum of operand bounds.
    Additive,
    /// Maximum of operand bounds.
    Max,
    /// One encrypted and one clear operand, combined by a dedicated rule.
    CustomBinary {
        /// How the clear operand scales the encrypted bound.
        rule: CustomRule,
        /// Position of the clear operand, 0 or 1.
        clear_operand: usize,
    },
}

impl NoiseClass {
    /// Snake-case name, as used in configs and reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            NoiseClass::Constant { .. } => "constant",
            NoiseClass::Zero => "zero",
            NoiseClass::Additive => "additive",
            NoiseClass::Max => "max",
            NoiseClass::CustomBinary { .. } => "custom_binary",
        }
    }
}

/// Rules for encrypted × clear binaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomRule {
    /// Clear addend: the encrypted bound carries over unchanged.
    Passthrough,
    /// `b × m²` with `m` the largest clear magnitude.
    ScalarMul,
    /// `b × Σ wᵢ²` over the clear weights.
    Dot,
}

/// Default classes per kind plus an explicit override table.
///
/// Consulted once per operation while the graph is built; propagation
/// only reads the class stored on each operation.
#[derive(Clone, Debug)]
pub struct Registry {
    fresh_noise: NoiseBound,
    overrides: HashMap<OpKind, NoiseClass>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(NoiseBound::one())
    }
}

impl Registry {
    /// Registry whose `input` operations start at `fresh_noise`.
    #[must_use]
    pub fn new(fresh_noise: NoiseBound) -> Self {
        Self {
            fresh_noise,
            overrides: HashMap::new(),
        }
    }

    /// Bound given to `input` operations.
    #[must_use]
    pub fn fresh_noise(&self) -> &NoiseBound {
        &self.fresh_noise
    }

    /// Register `class` for `kind`, replacing the built-in one if any.
    ///
    /// Custom binaries must name operand 0 or 1 as the clear side.
    pub fn set_override(&mut self, kind: OpKind, class: NoiseClass) -> Result<()> {
        if let NoiseClass::CustomBinary { clear_operand, .. } = &class {
            if *clear_operand > 1 {
                return Err(Error::InvalidOverride {
                    kind: kind.to_string(),
                    reason: format!("clear operand index {clear_operand} is not 0 or 1"),
                });
            }
        }
        if let Some(builtin) = kind.default_class(&self.fresh_noise) {
            warn!(%kind, from = builtin.name(), to = class.name(), "overriding built-in noise class");
        } else {
            debug!(%kind, class = class.name(), "registered noise class");
        }
        self.overrides.insert(kind, class);
        Ok(())
    }

    /// Resolve the noise class of `kind`.
    pub fn classify(&self, kind: &OpKind) -> Result<NoiseClass> {
        if let Some(class) = self.overrides.get(kind) {
            return Ok(class.clone());
        }
        kind.default_class(&self.fresh_noise)
            .ok_or_else(|| Error::MissingClassification(kind.to_string()))
    }
}
