//! Operand resolution for encrypted/clear binary operations.

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;

use crate::error::{Error, Result};
use crate::graph::{Graph, Operand, Operation};
use crate::registry::NoiseClass;
use crate::types::{Element, IntegerType, ValueType};

/// Position of the clear operand, as fixed by the operation's kind.
pub fn clear_operand_index(op: &Operation) -> Result<usize> {
    match op.class() {
        NoiseClass::CustomBinary { clear_operand, .. } => Ok(*clear_operand),
        _ => Err(Error::NotCustomBinary {
            op: op.id(),
            kind: op.kind().to_string(),
        }),
    }
}

/// Position of the encrypted operand, the other side of the clear one.
pub fn encrypted_operand_index(op: &Operation) -> Result<usize> {
    clear_operand_index(op).map(|i| 1 - i)
}

/// Full type of operand `index`.
pub fn operand_type<'g>(graph: &'g Graph, op: &'g Operation, index: usize) -> Result<&'g ValueType> {
    match op.operand(index)? {
        Operand::Value(target) => graph
            .operation(*target)
            .map(Operation::result)
            .ok_or(Error::UnknownOperation {
                op: op.id(),
                index,
                target: target.index(),
            }),
        Operand::Constant(c) => Ok(c.ty()),
    }
}

/// Element of a tensor operand, or the scalar type itself.
pub fn operand_element(graph: &Graph, op: &Operation, index: usize) -> Result<Element> {
    operand_type(graph, op, index).map(ValueType::element)
}

/// Width and signedness of operand `index`'s elements.
pub fn operand_element_type(graph: &Graph, op: &Operation, index: usize) -> Result<IntegerType> {
    operand_element(graph, op, index).map(|e| e.integer())
}

/// Like [`operand_element_type`], failing unless the element is of the
/// expected kind (encrypted or clear).
pub fn expect_operand_element(
    graph: &Graph,
    op: &Operation,
    index: usize,
    encrypted: bool,
) -> Result<IntegerType> {
    let element = operand_element(graph, op, index)?;
    if element.is_encrypted() != encrypted {
        return Err(Error::Type {
            op: op.id(),
            index,
            expected: if encrypted { "encrypted integer" } else { "clear integer" },
            found: operand_type(graph, op, index)?.to_string(),
        });
    }
    Ok(element.integer())
}

/// Materialized values of a constant operand, in storage order.
///
/// `None` when the operand is computed by another operation.
pub fn operand_constant_values(op: &Operation, index: usize) -> Result<Option<&[BigInt]>> {
    Ok(match op.operand(index)? {
        Operand::Constant(c) => Some(c.values()),
        Operand::Value(_) => None,
    })
}

/// Largest absolute value among a constant operand's elements.
///
/// `None` when the operand is not a compile-time constant. An empty
/// tensor has magnitude zero.
pub fn operand_max_constant_magnitude(op: &Operation, index: usize) -> Result<Option<BigUint>> {
    Ok(operand_constant_values(op, index)?.map(|values| {
        values
            .iter()
            .map(BigInt::magnitude)
            .max()
            .cloned()
            .unwrap_or_else(BigUint::zero)
    }))
}
