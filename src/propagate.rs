//! Forward propagation of noise bounds over the whole graph.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use num_bigint::BigUint;
use tracing::{debug, info};

use crate::bound::NoiseBound;
use crate::error::{Error, Result};
use crate::graph::{Graph, OpId, Operand};
use crate::rules::compute_output_bound;

/// Per-operation progress of the pass.
#[derive(Clone, Debug, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    BoundComputed(NoiseBound),
}

/// Write-once cache of computed bounds, indexed by operation id.
#[derive(Debug)]
struct BoundCache {
    states: Vec<VisitState>,
}

impl BoundCache {
    fn new(len: usize) -> Self {
        Self {
            states: vec![VisitState::Unvisited; len],
        }
    }

    fn get(&self, id: OpId) -> Option<&NoiseBound> {
        match self.states.get(id.index()) {
            Some(VisitState::BoundComputed(b)) => Some(b),
            _ => None,
        }
    }

    fn insert(&mut self, id: OpId, bound: NoiseBound) -> Result<()> {
        let slot = &mut self.states[id.index()];
        if *slot != VisitState::Unvisited {
            return Err(Error::AlreadyComputed(id));
        }
        *slot = VisitState::BoundComputed(bound);
        Ok(())
    }

    fn into_bounds(self) -> Vec<NoiseBound> {
        self.states
            .into_iter()
            .map(|s| match s {
                VisitState::BoundComputed(b) => b,
                VisitState::Unvisited => NoiseBound::zero(),
            })
            .collect()
    }
}

/// Definition-before-use order of all operations (Kahn's algorithm).
///
/// Among ready operations the smallest id goes first, so the order is
/// deterministic. Fails with [`Error::Cycle`] listing every operation left
/// unordered.
pub fn topological_order(graph: &Graph) -> Result<Vec<OpId>> {
    let n = graph.len();
    let mut pending = vec![0usize; n];
    let mut users: Vec<Vec<OpId>> = vec![Vec::new(); n];
    for op in graph.operations() {
        for dep in op.dependencies() {
            pending[op.id().index()] += 1;
            users[dep.index()].push(op.id());
        }
    }

    let mut ready: BinaryHeap<Reverse<OpId>> = (0..n)
        .filter(|&i| pending[i] == 0)
        .map(|i| Reverse(OpId::from(i)))
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for &user in &users[id.index()] {
            pending[user.index()] -= 1;
            if pending[user.index()] == 0 {
                ready.push(Reverse(user));
            }
        }
    }

    if order.len() != n {
        let stuck: Vec<OpId> = (0..n).filter(|&i| pending[i] > 0).map(OpId::from).collect();
        return Err(Error::Cycle(stuck));
    }
    Ok(order)
}

/// Bound of every operation in the graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoiseBounds {
    bounds: Vec<NoiseBound>,
    outputs: Vec<OpId>,
}

impl NoiseBounds {
    /// Squared bound of operation `id`.
    #[must_use]
    pub fn get(&self, id: OpId) -> Option<&NoiseBound> {
        self.bounds.get(id.index())
    }

    /// `(id, bound)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (OpId, &NoiseBound)> {
        self.bounds.iter().enumerate().map(|(i, b)| (OpId::from(i), b))
    }

    /// Number of operations covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Whether the graph was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// MANP (not squared) of operation `id`.
    #[must_use]
    pub fn manp(&self, id: OpId) -> Option<BigUint> {
        self.get(id).map(NoiseBound::manp)
    }

    /// Largest bound among the graph's tagged outputs.
    #[must_use]
    pub fn max_output_bound(&self) -> NoiseBound {
        NoiseBound::max_of(self.outputs.iter().filter_map(|id| self.get(*id)))
    }
}

/// Compute the bound of every operation in a single forward pass.
///
/// The graph is ordered first; a cycle aborts the pass before any bound
/// is produced.
pub fn propagate(graph: &Graph) -> Result<NoiseBounds> {
    let order = topological_order(graph)?;
    let mut cache = BoundCache::new(graph.len());

    for id in order {
        let op = graph
            .operation(id)
            .ok_or(Error::UnknownOperation { op: id, index: 0, target: id.index() })?;
        let operand_bounds = op
            .operands()
            .iter()
            .enumerate()
            .map(|(index, operand)| match operand {
                Operand::Value(target) => cache
                    .get(*target)
                    .cloned()
                    .ok_or(Error::Unresolved { op: id, index, target: *target }),
                Operand::Constant(_) => Ok(NoiseBound::zero()),
            })
            .collect::<Result<Vec<_>>>()?;

        let bound = compute_output_bound(graph, op, &operand_bounds)?;
        debug!(op = %id, kind = %op.kind(), %bound, "noise bound");
        cache.insert(id, bound)?;
    }

    let bounds = NoiseBounds {
        bounds: cache.into_bounds(),
        outputs: graph.outputs().to_vec(),
    };
    info!(
        operations = bounds.len(),
        max_output = %bounds.max_output_bound(),
        "noise propagation done"
    );
    Ok(bounds)
}
