//! Value types flowing along graph edges.

use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::One;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Widest integer element accepted.
pub const MAX_WIDTH: u32 = 128;

/// Integer element type: bit width and signedness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawIntegerType")]
pub struct IntegerType {
    width: u32,
    signed: bool,
}

#[derive(Deserialize)]
struct RawIntegerType {
    width: u32,
    #[serde(default)]
    signed: bool,
}

impl TryFrom<RawIntegerType> for IntegerType {
    type Error = Error;
    fn try_from(raw: RawIntegerType) -> Result<Self> {
        Self::new(raw.width, raw.signed)
    }
}

impl IntegerType {
    /// Fails with [`Error::InvalidWidth`] unless `1 <= width <= MAX_WIDTH`.
    pub fn new(width: u32, signed: bool) -> Result<Self> {
        if width == 0 || width > MAX_WIDTH {
            return Err(Error::InvalidWidth(width));
        }
        Ok(Self { width, signed })
    }

    /// Unsigned integer of `width` bits.
    pub fn unsigned(width: u32) -> Result<Self> {
        Self::new(width, false)
    }

    /// Two's complement integer of `width` bits.
    pub fn signed(width: u32) -> Result<Self> {
        Self::new(width, true)
    }

    /// Bit width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Whether negative values are representable.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Whether `value` is representable: `0..2^w` unsigned,
    /// `-2^(w-1)..2^(w-1)` signed.
    #[must_use]
    pub fn contains(&self, value: &BigInt) -> bool {
        let magnitude = value.magnitude();
        match (self.signed, value.sign()) {
            (false, Sign::Minus) => false,
            (false, _) => magnitude.bits() <= u64::from(self.width),
            (true, Sign::Minus) => *magnitude <= self.max_magnitude(),
            (true, _) => magnitude.bits() < u64::from(self.width),
        }
    }

    /// Largest absolute value representable: `2^w - 1` unsigned,
    /// `2^(w-1)` signed (the magnitude of the minimum).
    #[must_use]
    pub fn max_magnitude(&self) -> BigUint {
        if self.signed {
            BigUint::one() << (self.width - 1)
        } else {
            (BigUint::one() << self.width) - 1u32
        }
    }
}

impl fmt::Display for IntegerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.signed { "i" } else { "u" };
        write!(f, "{prefix}{}", self.width)
    }
}

/// Scalar element: either an encrypted integer or a clear one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    /// Ciphertext carrying noise.
    Encrypted(IntegerType),
    /// Plaintext value.
    Clear(IntegerType),
}

impl Element {
    /// Underlying integer type, whatever the element kind.
    #[must_use]
    pub fn integer(&self) -> IntegerType {
        match self {
            Element::Encrypted(t) | Element::Clear(t) => *t,
        }
    }

    /// Whether the element is a ciphertext.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Element::Encrypted(_))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Encrypted(t) => write!(f, "e{t}"),
            Element::Clear(t) => write!(f, "{t}"),
        }
    }
}

/// Type of an operation result or constant: scalar or tensor of elements.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Single element.
    Scalar(Element),
    /// Dense tensor in row-major storage order.
    Tensor {
        /// Type of every element.
        element: Element,
        /// Dimensions, outermost first.
        shape: Vec<usize>,
    },
}

impl ValueType {
    /// Encrypted scalar.
    #[must_use]
    pub fn encrypted(ty: IntegerType) -> Self {
        ValueType::Scalar(Element::Encrypted(ty))
    }

    /// Clear scalar.
    #[must_use]
    pub fn clear(ty: IntegerType) -> Self {
        ValueType::Scalar(Element::Clear(ty))
    }

    /// Tensor of `element` with the given shape; the shape is checked by
    /// [`ValueType::element_count`].
    #[must_use]
    pub fn tensor(element: Element, shape: Vec<usize>) -> Self {
        ValueType::Tensor { element, shape }
    }

    /// Element type of a tensor, or the scalar type itself.
    #[must_use]
    pub fn element(&self) -> Element {
        match self {
            ValueType::Scalar(e) | ValueType::Tensor { element: e, .. } => *e,
        }
    }

    /// Number of scalar elements, or [`Error::ShapeOverflow`] when the
    /// shape's product does not fit in `usize`.
    pub fn element_count(&self) -> Result<usize> {
        match self {
            ValueType::Scalar(_) => Ok(1),
            ValueType::Tensor { shape, .. } => shape
                .iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                .ok_or_else(|| Error::ShapeOverflow(shape.clone())),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(e) => write!(f, "{e}"),
            ValueType::Tensor { element, shape } => {
                write!(f, "tensor<")?;
                for d in shape {
                    write!(f, "{d}x")?;
                }
                write!(f, "{element}>")
            }
        }
    }
}
