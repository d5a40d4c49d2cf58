//! MANP ― squared noise-bound propagation over FHE operation graphs.
//!
//! Each operation carries a noise class resolved when the graph is built;
//! [`propagate`] walks the graph once in definition-before-use order and
//! yields an upper bound on the squared noise of every result.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, missing_docs)]

pub mod bound;
pub mod config;
pub mod error;
pub mod graph;
pub mod kind;
pub mod operand;
pub mod propagate;
pub mod registry;
pub mod report;
pub mod rules;
pub mod types;

pub use bound::NoiseBound;
pub use config::AnalysisConfig;
pub use error::{Error, Result};
pub use graph::{ClearConstant, Graph, GraphBuilder, Location, OpId, Operand, Operation};
pub use kind::OpKind;
pub use propagate::{propagate, topological_order, NoiseBounds};
pub use registry::{CustomRule, NoiseClass, Registry};
pub use rules::compute_output_bound;
pub use types::{Element, IntegerType, ValueType};
