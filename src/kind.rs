//! Operation kinds and their static properties.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::registry::{CustomRule, NoiseClass};

/// Tag identifying what an operation computes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OpKind {
    /// Fresh encryption of a circuit argument.
    Input,
    /// Clear circuit argument known only at run time.
    ClearInput,
    /// Encrypted zeros, noiseless.
    Zeros,
    /// Table lookup through programmable bootstrapping.
    Tlu,
    /// Encrypted sum of any number of encrypted operands.
    Add,
    /// Encrypted difference of two encrypted operands.
    Subtract,
    /// Encrypted negation.
    Negative,
    /// Encrypted select between branches.
    Where,
    /// Tensor concatenation.
    Concatenate,
    /// Tensor reshape.
    Reshape,
    /// Tensor transpose.
    Transpose,
    /// Static tensor indexing or slicing.
    IndexStatic,
    /// Value forwarded unchanged.
    Identity,
    /// Dropping low bits of an encrypted value.
    Round,
    /// Reinterpretation of an encrypted value at another precision.
    UnsafeCast,
    /// Encrypted plus clear.
    AddEintInt,
    /// Clear plus encrypted.
    AddIntEint,
    /// Encrypted minus clear.
    SubEintInt,
    /// Clear minus encrypted.
    SubIntEint,
    /// Encrypted times clear.
    MulEintInt,
    /// Clear times encrypted.
    MulIntEint,
    /// Dot product of an encrypted tensor with clear weights.
    DotEintInt,
    /// Dialect operation only known through the override table.
    Extern(String),
}

/// Number of operands an operation kind accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many.
    Exact(usize),
    /// This many or more.
    AtLeast(usize),
    /// No constraint.
    Any,
}

impl Arity {
    /// Whether `n` operands are allowed.
    #[must_use]
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Any => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

static BUILTIN: [(&str, OpKind); 22] = [
    ("input", OpKind::Input),
    ("clear_input", OpKind::ClearInput),
    ("zeros", OpKind::Zeros),
    ("tlu", OpKind::Tlu),
    ("add", OpKind::Add),
    ("subtract", OpKind::Subtract),
    ("negative", OpKind::Negative),
    ("where", OpKind::Where),
    ("concatenate", OpKind::Concatenate),
    ("reshape", OpKind::Reshape),
    ("transpose", OpKind::Transpose),
    ("index_static", OpKind::IndexStatic),
    ("identity", OpKind::Identity),
    ("round", OpKind::Round),
    ("unsafe_cast", OpKind::UnsafeCast),
    ("add_eint_int", OpKind::AddEintInt),
    ("add_int_eint", OpKind::AddIntEint),
    ("sub_eint_int", OpKind::SubEintInt),
    ("sub_int_eint", OpKind::SubIntEint),
    ("mul_eint_int", OpKind::MulEintInt),
    ("mul_int_eint", OpKind::MulIntEint),
    ("dot_eint_int", OpKind::DotEintInt),
];

const EXTERN_PREFIX: &str = "extern:";

impl OpKind {
    /// Every built-in kind, in declaration order.
    pub fn builtins() -> impl Iterator<Item = OpKind> {
        BUILTIN.iter().map(|(_, k)| k.clone())
    }

    /// Name without the `extern:` prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            OpKind::Extern(name) => name,
            kind => BUILTIN
                .iter()
                .find(|(_, k)| k == kind)
                .map_or("?", |(n, _)| *n),
        }
    }

    /// Operand counts the kind accepts.
    #[must_use]
    pub fn arity(&self) -> Arity {
        match self {
            Self::Input | Self::ClearInput | Self::Zeros => Arity::Exact(0),
            Self::Tlu
            | Self::Negative
            | Self::Reshape
            | Self::Transpose
            | Self::IndexStatic
            | Self::Identity
            | Self::Round
            | Self::UnsafeCast => Arity::Exact(1),
            Self::Subtract => Arity::Exact(2),
            Self::Add | Self::Where | Self::Concatenate => Arity::AtLeast(1),
            Self::AddEintInt
            | Self::AddIntEint
            | Self::SubEintInt
            | Self::SubIntEint
            | Self::MulEintInt
            | Self::MulIntEint
            | Self::DotEintInt => Arity::Exact(2),
            Self::Extern(_) => Arity::Any,
        }
    }

    /// Operand position of the clear value in encrypted/clear binaries.
    ///
    /// Fixed per kind: `*_eint_int` carry it at 1, `*_int_eint` at 0.
    #[must_use]
    pub fn clear_operand_index(&self) -> Option<usize> {
        match self {
            Self::AddEintInt | Self::SubEintInt | Self::MulEintInt | Self::DotEintInt => Some(1),
            Self::AddIntEint | Self::SubIntEint | Self::MulIntEint => Some(0),
            _ => None,
        }
    }

    /// Built-in noise class; `fresh` is the bound of a fresh encryption.
    ///
    /// `None` for [`OpKind::Extern`], which needs an override.
    #[must_use]
    pub fn default_class(&self, fresh: &crate::NoiseBound) -> Option<NoiseClass> {
        let custom = |rule| {
            self.clear_operand_index()
                .map(|clear_operand| NoiseClass::CustomBinary { rule, clear_operand })
        };
        match self {
            Self::Input => Some(NoiseClass::Constant { bound: fresh.clone() }),
            Self::ClearInput | Self::Zeros | Self::Tlu => Some(NoiseClass::Zero),
            Self::Add | Self::Subtract | Self::Negative => Some(NoiseClass::Additive),
            Self::Where
            | Self::Concatenate
            | Self::Reshape
            | Self::Transpose
            | Self::IndexStatic
            | Self::Identity
            | Self::Round
            | Self::UnsafeCast => Some(NoiseClass::Max),
            Self::AddEintInt | Self::AddIntEint | Self::SubEintInt | Self::SubIntEint => {
                custom(CustomRule::Passthrough)
            }
            Self::MulEintInt | Self::MulIntEint => custom(CustomRule::ScalarMul),
            Self::DotEintInt => custom(CustomRule::Dot),
            Self::Extern(_) => None,
        }
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix(EXTERN_PREFIX) {
            if name.is_empty() {
                return Err(Error::UnknownKind(s.to_string()));
            }
            return Ok(OpKind::Extern(name.to_string()));
        }
        BUILTIN
            .iter()
            .find(|(n, _)| *n == s)
            .map(|(_, k)| k.clone())
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

impl TryFrom<String> for OpKind {
    type Error = Error;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<OpKind> for String {
    fn from(k: OpKind) -> Self {
        k.to_string()
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Extern(name) => write!(f, "{EXTERN_PREFIX}{name}"),
            kind => f.write_str(kind.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoiseBound;

    #[test]
    fn test_name_round_trip() {
        for kind in OpKind::builtins() {
            assert_eq!(kind.to_string().parse::<OpKind>().unwrap(), kind);
        }
        let ext: OpKind = "extern:fhe.custom".parse().unwrap();
        assert_eq!(ext, OpKind::Extern("fhe.custom".into()));
        assert_eq!(ext.to_string(), "extern:fhe.custom");
    }

    #[test]
    fn test_unknown_kind() {
        assert!(matches!("frobnicate".parse::<OpKind>(), Err(Error::UnknownKind(_))));
        assert!(matches!("extern:".parse::<OpKind>(), Err(Error::UnknownKind(_))));
    }

    #[test]
    fn test_clear_operand_index() {
        assert_eq!(OpKind::MulEintInt.clear_operand_index(), Some(1));
        assert_eq!(OpKind::MulIntEint.clear_operand_index(), Some(0));
        assert_eq!(OpKind::SubIntEint.clear_operand_index(), Some(0));
        assert_eq!(OpKind::Add.clear_operand_index(), None);
    }

    #[test]
    fn test_every_builtin_is_classified() {
        let fresh = NoiseBound::one();
        for kind in OpKind::builtins() {
            assert!(kind.default_class(&fresh).is_some(), "{kind} has no class");
        }
        assert!(OpKind::Extern("x".into()).default_class(&fresh).is_none());
    }

    #[test]
    fn test_precision_changes_keep_noise() {
        let fresh = NoiseBound::one();
        for name in ["round", "unsafe_cast"] {
            let kind: OpKind = name.parse().unwrap();
            assert_eq!(kind.arity(), Arity::Exact(1));
            assert_eq!(kind.default_class(&fresh), Some(NoiseClass::Max));
            assert_eq!(kind.to_string(), name);
        }
    }

    #[test]
    fn test_arity() {
        assert!(OpKind::Add.arity().accepts(5));
        assert!(!OpKind::Add.arity().accepts(0));
        assert!(OpKind::MulEintInt.arity().accepts(2));
        assert!(!OpKind::Negative.arity().accepts(2));
    }
}
