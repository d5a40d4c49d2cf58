//! Output bound of a single operation from its operand bounds.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::bound::NoiseBound;
use crate::error::{Error, Result};
use crate::graph::{Graph, Operation};
use crate::operand::{
    expect_operand_element, operand_constant_values, operand_max_constant_magnitude, operand_type,
};
use crate::registry::{CustomRule, NoiseClass};

/// Bound on the output noise of `op`.
///
/// `operand_bounds` holds one bound per operand, in operand order; clear
/// constants contribute [`NoiseBound::zero`]. Deterministic for a
/// well-formed graph.
pub fn compute_output_bound(graph: &Graph, op: &Operation, operand_bounds: &[NoiseBound]) -> Result<NoiseBound> {
    if operand_bounds.len() != op.operands().len() {
        return Err(Error::OperandCount {
            op: op.id(),
            kind: op.kind().to_string(),
            expected: op.operands().len().to_string(),
            found: operand_bounds.len(),
        });
    }
    Ok(match op.class() {
        NoiseClass::Constant { bound } => bound.clone(),
        NoiseClass::Zero => NoiseBound::zero(),
        NoiseClass::Additive => operand_bounds.iter().sum(),
        NoiseClass::Max => NoiseBound::max_of(operand_bounds),
        NoiseClass::CustomBinary { rule, clear_operand } => {
            custom_binary(graph, op, *rule, *clear_operand, operand_bounds)?
        }
    })
}

fn custom_binary(
    graph: &Graph,
    op: &Operation,
    rule: CustomRule,
    clear: usize,
    operand_bounds: &[NoiseBound],
) -> Result<NoiseBound> {
    let encrypted = 1 - clear;
    expect_operand_element(graph, op, encrypted, true)?;
    let clear_ty = expect_operand_element(graph, op, clear, false)?;
    let input = &operand_bounds[encrypted];

    match rule {
        CustomRule::Passthrough => Ok(input.clone()),
        CustomRule::ScalarMul => {
            let magnitude = operand_max_constant_magnitude(op, clear)?
                .unwrap_or_else(|| clear_ty.max_magnitude());
            Ok(input.scale_squared(&magnitude))
        }
        CustomRule::Dot => {
            let norm2 = match operand_constant_values(op, clear)? {
                Some(weights) => weights
                    .iter()
                    .map(|w| w.magnitude() * w.magnitude())
                    .fold(BigUint::zero(), |acc, w2| acc + w2),
                None => {
                    // runtime weights: every element may reach the type's extreme
                    let m = clear_ty.max_magnitude();
                    BigUint::from(operand_type(graph, op, clear)?.element_count()?) * &m * &m
                }
            };
            Ok(input * &norm2)
        }
    }
}
