//! Operation graph: operations, operands, construction and interchange.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use num_bigint::BigInt;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::kind::OpKind;
use crate::registry::{NoiseClass, Registry};
use crate::types::{Element, IntegerType, ValueType};

/// Identity of an operation: its position in the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(usize);

impl OpId {
    /// Position in the graph's operation list.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for OpId {
    fn from(i: usize) -> Self {
        Self(i)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Source position an operation was traced from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Location {
    /// No position recorded.
    #[default]
    Unknown,
    /// File only.
    File(String),
    /// File and line.
    Line(String, u32),
    /// File, line and column.
    LineColumn(String, u32, u32),
}

impl FromStr for Location {
    type Err = Error;

    /// Parses `file`, `file:line` or `file:line:column`; empty is unknown.
    fn from_str(s: &str) -> Result<Self> {
        let number = |v: &str| v.parse::<u32>().map_err(|_| Error::Location(s.to_string()));
        let parts: Vec<&str> = s.split(':').collect();
        match parts[..] {
            [""] => Ok(Location::Unknown),
            [file] => Ok(Location::File(file.into())),
            [file, line] => Ok(Location::Line(file.into(), number(line)?)),
            [file, line, column] => Ok(Location::LineColumn(file.into(), number(line)?, number(column)?)),
            _ => Err(Error::Location(s.to_string())),
        }
    }
}

impl TryFrom<String> for Location {
    type Error = Error;
    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Location> for String {
    fn from(l: Location) -> Self {
        l.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Unknown => Ok(()),
            Location::File(file) => write!(f, "{file}"),
            Location::Line(file, line) => write!(f, "{file}:{line}"),
            Location::LineColumn(file, line, col) => write!(f, "{file}:{line}:{col}"),
        }
    }
}

/// Compile-time clear value: a scalar or a tensor in storage order.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConstant")]
pub struct ClearConstant {
    ty: ValueType,
    values: Vec<BigInt>,
}

#[derive(Deserialize)]
struct RawConstant {
    #[serde(rename = "type")]
    ty: ValueType,
    values: Vec<RawInt>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInt {
    Int(i64),
    Str(String),
}

impl TryFrom<RawConstant> for ClearConstant {
    type Error = Error;
    fn try_from(raw: RawConstant) -> Result<Self> {
        let values = raw
            .values
            .into_iter()
            .map(|v| match v {
                RawInt::Int(i) => Ok(BigInt::from(i)),
                RawInt::Str(s) => s
                    .parse::<BigInt>()
                    .map_err(|_| Error::InvalidConstant(format!("`{s}` is not an integer"))),
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(raw.ty, values)
    }
}

impl ClearConstant {
    /// Checks that `ty` has clear elements, that `values` fills it exactly
    /// and that every value fits the element type.
    pub fn new(ty: ValueType, values: Vec<BigInt>) -> Result<Self> {
        let element = ty.element();
        if element.is_encrypted() {
            return Err(Error::InvalidConstant(format!("constant of encrypted type {ty}")));
        }
        let expected = ty.element_count()?;
        if values.len() != expected {
            return Err(Error::InvalidConstant(format!(
                "{} value(s) for type {ty} holding {expected}",
                values.len()
            )));
        }
        let integer = element.integer();
        if let Some(v) = values.iter().find(|v| !integer.contains(v)) {
            return Err(Error::InvalidConstant(format!("{v} does not fit {integer}")));
        }
        Ok(Self { ty, values })
    }

    /// Clear scalar of type `ty`.
    pub fn scalar(ty: IntegerType, value: impl Into<BigInt>) -> Result<Self> {
        Self::new(ValueType::clear(ty), vec![value.into()])
    }

    /// One-dimensional clear tensor.
    pub fn vector<V: Into<BigInt>>(ty: IntegerType, values: impl IntoIterator<Item = V>) -> Result<Self> {
        let values: Vec<BigInt> = values.into_iter().map(Into::into).collect();
        let ty = ValueType::tensor(Element::Clear(ty), vec![values.len()]);
        Self::new(ty, values)
    }

    /// Declared type.
    #[must_use]
    pub fn ty(&self) -> &ValueType {
        &self.ty
    }

    /// Values in storage order.
    #[must_use]
    pub fn values(&self) -> &[BigInt] {
        &self.values
    }
}

impl Serialize for ClearConstant {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let values: Vec<String> = self.values.iter().map(ToString::to_string).collect();
        let mut st = serializer.serialize_struct("ClearConstant", 2)?;
        st.serialize_field("type", &self.ty)?;
        st.serialize_field("values", &values)?;
        st.end()
    }
}

impl fmt::Display for ClearConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ty {
            ValueType::Scalar(_) => write!(f, "{}", self.values.iter().join("")),
            ValueType::Tensor { .. } => write!(f, "[{}]", self.values.iter().join(", ")),
        }
    }
}

/// Input of an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Result of another operation; carries that operation's bound.
    Value(OpId),
    /// Compile-time constant; contributes no noise of its own.
    Constant(ClearConstant),
}

impl From<OpId> for Operand {
    fn from(id: OpId) -> Self {
        Operand::Value(id)
    }
}

impl From<ClearConstant> for Operand {
    fn from(c: ClearConstant) -> Self {
        Operand::Constant(c)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(id) => write!(f, "{id}"),
            Operand::Constant(c) => write!(f, "const {c}"),
        }
    }
}

/// A node of the dataflow graph with its resolved noise class.
#[derive(Clone, Debug)]
pub struct Operation {
    id: OpId,
    kind: OpKind,
    operands: Vec<Operand>,
    result: ValueType,
    location: Location,
    class: NoiseClass,
}

impl Operation {
    /// Classify and validate an operation; `known` is the number of
    /// operations its operands may refer to.
    fn resolve(id: OpId, desc: OperationDescription, registry: &Registry, known: usize) -> Result<Self> {
        let OperationDescription { kind, operands, result, location } = desc;
        let class = registry.classify(&kind)?;

        let arity = kind.arity();
        let binary = matches!(class, NoiseClass::CustomBinary { .. });
        if !arity.accepts(operands.len()) || (binary && operands.len() != 2) {
            let expected = if binary { "2".to_string() } else { arity.to_string() };
            return Err(Error::OperandCount {
                op: id,
                kind: kind.to_string(),
                expected,
                found: operands.len(),
            });
        }

        result.element_count()?;
        for (index, operand) in operands.iter().enumerate() {
            if let Operand::Value(target) = operand {
                if target.0 >= known {
                    return Err(Error::UnknownOperation { op: id, index, target: target.0 });
                }
            }
        }

        Ok(Self { id, kind, operands, result, location, class })
    }

    /// Position in the graph.
    #[must_use]
    pub fn id(&self) -> OpId {
        self.id
    }

    /// What the operation computes.
    #[must_use]
    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    /// Inputs in operand order.
    #[must_use]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Operand at `index`, or [`Error::OperandIndex`].
    pub fn operand(&self, index: usize) -> Result<&Operand> {
        self.operands
            .get(index)
            .ok_or(Error::OperandIndex { op: self.id, index })
    }

    /// Type of the produced value.
    #[must_use]
    pub fn result(&self) -> &ValueType {
        &self.result
    }

    /// Source position it was traced from.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Noise class resolved when the graph was built.
    #[must_use]
    pub fn class(&self) -> &NoiseClass {
        &self.class
    }

    /// Ids of the operations this one reads.
    pub fn dependencies(&self) -> impl Iterator<Item = OpId> + '_ {
        self.operands.iter().filter_map(|o| match o {
            Operand::Value(id) => Some(*id),
            Operand::Constant(_) => None,
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {}({}) : {} [{}]",
            self.id,
            self.kind,
            self.operands.iter().join(", "),
            self.result,
            self.class.name()
        )?;
        if self.location != Location::Unknown {
            write!(f, " @ {}", self.location)?;
        }
        Ok(())
    }
}

/// Serializable, unvalidated form of an operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationDescription {
    /// Operation kind, e.g. `"add"` or `"extern:fhe.max_eint"`.
    pub kind: OpKind,
    /// Operation ids or inline clear constants.
    #[serde(default)]
    pub operands: Vec<Operand>,
    /// Type of the produced value.
    pub result: ValueType,
    /// `file[:line[:column]]`, empty when unknown.
    #[serde(default)]
    pub location: Location,
}

/// Serializable graph interchange form.
///
/// Operands refer to operations by position and may point forward, so a
/// description can encode cycles; those surface during propagation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphDescription {
    /// Operations; the position of each is its id.
    pub operations: Vec<OperationDescription>,
    /// Ids of the circuit results.
    #[serde(default)]
    pub outputs: Vec<OpId>,
}

/// Validated operation graph.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    ops: Vec<Operation>,
    outputs: Vec<OpId>,
}

impl Graph {
    /// Validate `desc` against `registry`.
    pub fn from_description(desc: GraphDescription, registry: &Registry) -> Result<Self> {
        let known = desc.operations.len();
        let ops = desc
            .operations
            .into_iter()
            .enumerate()
            .map(|(i, d)| Operation::resolve(OpId(i), d, registry, known))
            .collect::<Result<Vec<_>>>()?;
        for id in &desc.outputs {
            if id.0 >= known {
                return Err(Error::UnknownOutput(id.0));
            }
        }
        debug!(operations = ops.len(), outputs = desc.outputs.len(), "graph loaded");
        Ok(Self { ops, outputs: desc.outputs })
    }

    /// Parse and validate a JSON description.
    pub fn from_json(json: &str, registry: &Registry) -> Result<Self> {
        let desc: GraphDescription = serde_json::from_str(json)?;
        Self::from_description(desc, registry)
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the graph has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operation `id`, if it exists.
    #[must_use]
    pub fn operation(&self, id: OpId) -> Option<&Operation> {
        self.ops.get(id.0)
    }

    /// All operations in id order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter()
    }

    /// Encrypted circuit arguments.
    pub fn inputs(&self) -> impl Iterator<Item = OpId> + '_ {
        self.ops
            .iter()
            .filter(|op| op.kind == OpKind::Input)
            .map(|op| op.id)
    }

    /// Operations tagged as circuit results, in tagging order.
    #[must_use]
    pub fn outputs(&self) -> &[OpId] {
        &self.outputs
    }

    /// Whether `id` is tagged as a circuit result.
    #[must_use]
    pub fn is_output(&self, id: OpId) -> bool {
        self.outputs.contains(&id)
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            writeln!(f, "{op}")?;
        }
        write!(f, "outputs: {}", self.outputs.iter().join(", "))
    }
}

/// Incremental graph construction in definition order.
///
/// Operands can only name operations already added, so built graphs are
/// acyclic by construction.
pub struct GraphBuilder<'r> {
    registry: &'r Registry,
    graph: Graph,
}

impl<'r> GraphBuilder<'r> {
    /// Empty builder classifying operations through `registry`.
    #[must_use]
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            graph: Graph::default(),
        }
    }

    /// Fresh encrypted argument.
    pub fn add_input(&mut self, result: ValueType, location: Location) -> Result<OpId> {
        self.add_op(OpKind::Input, vec![], result, location)
    }

    /// Clear argument known only at run time.
    pub fn add_clear_input(&mut self, result: ValueType, location: Location) -> Result<OpId> {
        self.add_op(OpKind::ClearInput, vec![], result, location)
    }

    /// Encrypted zeros.
    pub fn add_zeros(&mut self, result: ValueType, location: Location) -> Result<OpId> {
        self.add_op(OpKind::Zeros, vec![], result, location)
    }

    /// Append an operation of any kind and return its id.
    pub fn add_op(
        &mut self,
        kind: OpKind,
        operands: Vec<Operand>,
        result: ValueType,
        location: Location,
    ) -> Result<OpId> {
        let id = OpId(self.graph.ops.len());
        let desc = OperationDescription { kind, operands, result, location };
        let op = Operation::resolve(id, desc, self.registry, id.0)?;
        self.graph.ops.push(op);
        Ok(id)
    }

    /// Mark `id` as a circuit result; tagging twice is a no-op.
    pub fn tag_output(&mut self, id: OpId) -> Result<()> {
        if id.0 >= self.graph.ops.len() {
            return Err(Error::UnknownOutput(id.0));
        }
        if !self.graph.outputs.contains(&id) {
            self.graph.outputs.push(id);
        }
        Ok(())
    }

    /// Finished graph.
    #[must_use]
    pub fn build(self) -> Graph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eint(width: u32) -> ValueType {
        ValueType::encrypted(IntegerType::unsigned(width).unwrap())
    }

    #[test]
    fn test_location_parse() {
        assert_eq!("".parse::<Location>().unwrap(), Location::Unknown);
        assert_eq!("a.py".parse::<Location>().unwrap(), Location::File("a.py".into()));
        assert_eq!("a.py:3".parse::<Location>().unwrap(), Location::Line("a.py".into(), 3));
        assert_eq!(
            "a.py:3:7".parse::<Location>().unwrap(),
            Location::LineColumn("a.py".into(), 3, 7)
        );
        assert!("a.py:x".parse::<Location>().is_err());
        assert!("a:1:2:3".parse::<Location>().is_err());
        assert_eq!(Location::LineColumn("a.py".into(), 3, 7).to_string(), "a.py:3:7");
    }

    #[test]
    fn test_constant_validation() {
        let u8t = IntegerType::unsigned(8).unwrap();
        assert!(ClearConstant::vector(u8t, [1, 2, 3]).is_ok());
        let bad = ClearConstant::new(ValueType::tensor(Element::Clear(u8t), vec![2, 2]), vec![BigInt::from(1)]);
        assert!(matches!(bad, Err(Error::InvalidConstant(_))));
        let enc = ClearConstant::new(ValueType::encrypted(u8t), vec![BigInt::from(1)]);
        assert!(matches!(enc, Err(Error::InvalidConstant(_))));
    }

    #[test]
    fn test_constant_values_fit_type() {
        let u4 = IntegerType::unsigned(4).unwrap();
        let i4 = IntegerType::signed(4).unwrap();
        assert!(ClearConstant::scalar(u4, 15).is_ok());
        assert!(matches!(ClearConstant::scalar(u4, 1000), Err(Error::InvalidConstant(_))));
        assert!(matches!(ClearConstant::scalar(u4, -3), Err(Error::InvalidConstant(_))));
        assert!(ClearConstant::vector(i4, [-8, 7]).is_ok());
        assert!(matches!(ClearConstant::vector(i4, [-9, 0]), Err(Error::InvalidConstant(_))));

        let json = r#"{
            "operations": [
                {"kind": "input", "result": {"scalar": {"encrypted": {"width": 4}}}},
                {"kind": "mul_eint_int",
                 "operands": [0, {"type": {"scalar": {"clear": {"width": 4}}}, "values": [-3]}],
                 "result": {"scalar": {"encrypted": {"width": 4}}}}
            ]
        }"#;
        assert!(Graph::from_json(json, &Registry::default()).is_err());
    }

    #[test]
    fn test_oversized_tensor_rejected() {
        let u4 = IntegerType::unsigned(4).unwrap();
        let huge = ValueType::tensor(Element::Clear(u4), vec![1 << 32, 1 << 32]);
        assert!(matches!(ClearConstant::new(huge, vec![]), Err(Error::ShapeOverflow(_))));

        let constant = r#"{
            "operations": [
                {"kind": "input", "result": {"scalar": {"encrypted": {"width": 4}}}},
                {"kind": "mul_eint_int",
                 "operands": [0, {"type": {"tensor": {"element": {"clear": {"width": 4}}, "shape": [4294967296, 4294967296]}}, "values": []}],
                 "result": {"scalar": {"encrypted": {"width": 4}}}}
            ]
        }"#;
        assert!(Graph::from_json(constant, &Registry::default()).is_err());

        let result = r#"{
            "operations": [
                {"kind": "clear_input", "result": {"tensor": {"element": {"clear": {"width": 4}}, "shape": [4294967296, 4294967296]}}}
            ]
        }"#;
        assert!(matches!(
            Graph::from_json(result, &Registry::default()),
            Err(Error::ShapeOverflow(shape)) if shape == [1usize << 32, 1 << 32]
        ));
    }

    #[test]
    fn test_unknown_output_rejected() {
        let json = r#"{
            "operations": [{"kind": "input", "result": {"scalar": {"encrypted": {"width": 4}}}}],
            "outputs": [3]
        }"#;
        let err = Graph::from_json(json, &Registry::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownOutput(3)));
        assert_eq!(err.to_string(), "output refers to unknown operation 3");
    }

    #[test]
    fn test_builder_validates() {
        let reg = Registry::default();
        let mut b = GraphBuilder::new(&reg);
        let x = b.add_input(eint(4), Location::Unknown).unwrap();

        let err = b.add_op(OpKind::Negative, vec![x.into(), x.into()], eint(4), Location::Unknown);
        assert!(matches!(err, Err(Error::OperandCount { found: 2, .. })));

        let err = b.add_op(OpKind::Negative, vec![OpId(9).into()], eint(4), Location::Unknown);
        assert!(matches!(err, Err(Error::UnknownOperation { target: 9, .. })));

        let err = b.add_op(OpKind::Extern("fhe.mystery".into()), vec![x.into()], eint(4), Location::Unknown);
        assert!(matches!(err, Err(Error::MissingClassification(_))));

        let n = b.add_op(OpKind::Negative, vec![x.into()], eint(4), Location::Unknown).unwrap();
        b.tag_output(n).unwrap();
        assert!(matches!(b.tag_output(OpId(5)), Err(Error::UnknownOutput(5))));

        let g = b.build();
        assert_eq!(g.len(), 2);
        assert_eq!(g.inputs().collect::<Vec<_>>(), vec![x]);
        assert_eq!(g.outputs(), &[n]);
        assert_eq!(g.operation(n).unwrap().dependencies().collect::<Vec<_>>(), vec![x]);
    }

    #[test]
    fn test_extern_custom_binary_needs_two_operands() {
        let mut reg = Registry::default();
        reg.set_override(
            OpKind::Extern("fhe.mul".into()),
            NoiseClass::CustomBinary { rule: crate::CustomRule::ScalarMul, clear_operand: 1 },
        )
        .unwrap();
        let mut b = GraphBuilder::new(&reg);
        let x = b.add_input(eint(4), Location::Unknown).unwrap();
        let err = b.add_op(OpKind::Extern("fhe.mul".into()), vec![x.into()], eint(4), Location::Unknown);
        assert!(matches!(err, Err(Error::OperandCount { expected, .. }) if expected == "2"));
    }

    #[test]
    fn test_from_json_and_dump() {
        let json = r#"{
            "operations": [
                {"kind": "input", "result": {"scalar": {"encrypted": {"width": 4}}}, "location": "f.py:1"},
                {"kind": "mul_eint_int",
                 "operands": [0, {"type": {"scalar": {"clear": {"width": 4}}}, "values": [3]}],
                 "result": {"scalar": {"encrypted": {"width": 4}}}}
            ],
            "outputs": [1]
        }"#;
        let g = Graph::from_json(json, &Registry::default()).unwrap();
        assert_eq!(g.len(), 2);
        assert!(g.is_output(OpId(1)));
        let dump = g.to_string();
        assert!(dump.contains("%0 = input() : eu4 [constant] @ f.py:1"));
        assert!(dump.contains("%1 = mul_eint_int(%0, const 3) : eu4 [custom_binary]"));
        assert!(dump.ends_with("outputs: %1"));
    }

    #[test]
    fn test_description_allows_forward_references() {
        let json = r#"{
            "operations": [
                {"kind": "negative", "operands": [1], "result": {"scalar": {"encrypted": {"width": 4}}}},
                {"kind": "input", "result": {"scalar": {"encrypted": {"width": 4}}}}
            ]
        }"#;
        let g = Graph::from_json(json, &Registry::default()).unwrap();
        assert_eq!(g.operation(OpId(0)).unwrap().dependencies().next(), Some(OpId(1)));

        let bad = r#"{"operations": [{"kind": "negative", "operands": [4], "result": {"scalar": {"encrypted": {"width": 4}}}}]}"#;
        assert!(matches!(Graph::from_json(bad, &Registry::default()), Err(Error::UnknownOperation { .. })));
    }
}
