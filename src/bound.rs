//! Squared noise bounds (squared MANP) with arbitrary precision.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};

use num_bigint::BigUint;
use num_integer::Roots;
use num_traits::{One, Zero};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Upper bound on the squared noise magnitude of a ciphertext.
///
/// Never negative; grows without overflow.
///
/// Serialized as a decimal string; also read from a plain JSON integer.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoiseBound(BigUint);

impl NoiseBound {
    /// The zero bound: a noiseless (or freshly bootstrapped) value.
    #[must_use]
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Bound of a single fresh encryption in the default model.
    #[must_use]
    pub fn one() -> Self {
        Self(BigUint::one())
    }

    /// Whether the bound is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Underlying integer.
    #[must_use]
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Scale by the square of a clear magnitude: `self × m²`.
    #[must_use]
    pub fn scale_squared(&self, magnitude: &BigUint) -> Self {
        Self(&self.0 * magnitude * magnitude)
    }

    /// MANP itself, i.e. the ceiling of the square root of the squared bound.
    #[must_use]
    pub fn manp(&self) -> BigUint {
        let root = Roots::sqrt(&self.0);
        if &root * &root == self.0 {
            root
        } else {
            root + 1u32
        }
    }

    /// Largest of the given bounds, zero for an empty sequence.
    pub fn max_of<'a, I>(bounds: I) -> Self
    where
        I: IntoIterator<Item = &'a NoiseBound>,
    {
        bounds.into_iter().max().cloned().unwrap_or_default()
    }
}

impl From<u64> for NoiseBound {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<BigUint> for NoiseBound {
    fn from(v: BigUint) -> Self {
        Self(v)
    }
}

impl fmt::Display for NoiseBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for NoiseBound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NoiseBound {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(u64),
            Str(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Int(v) => Ok(Self::from(v)),
            Repr::Str(s) => s
                .parse::<BigUint>()
                .map(Self)
                .map_err(|e| de::Error::custom(format!("invalid noise bound `{s}`: {e}"))),
        }
    }
}

impl Add<&NoiseBound> for &NoiseBound {
    type Output = NoiseBound;
    fn add(self, rhs: &NoiseBound) -> Self::Output {
        NoiseBound(&self.0 + &rhs.0)
    }
}

impl Add<&NoiseBound> for NoiseBound {
    type Output = NoiseBound;
    fn add(self, rhs: &NoiseBound) -> Self::Output {
        NoiseBound(self.0 + &rhs.0)
    }
}

impl Mul<&BigUint> for &NoiseBound {
    type Output = NoiseBound;
    fn mul(self, rhs: &BigUint) -> Self::Output {
        NoiseBound(&self.0 * rhs)
    }
}

impl<'a> Sum<&'a NoiseBound> for NoiseBound {
    fn sum<I: Iterator<Item = &'a NoiseBound>>(iter: I) -> Self {
        iter.fold(NoiseBound::zero(), |acc, b| acc + b)
    }
}
