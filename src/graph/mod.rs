//! Operand dependency graph
//!
//! Built once from the registered operands when a composite operator is
//! constructed. Edges run from a required operand to its dependents. The
//! graph rejects duplicate names, requirements on unregistered operands and
//! cycles (a self-reference is the shortest cycle), so an invalid
//! composition never reaches a reconciliation pass.
//!
//! Ordering is deterministic: among operands whose requirements are all
//! satisfied, the one registered first comes first.

use std::collections::{BTreeMap, BTreeSet};

use crate::Error;

/// Validated dependency graph over operand names
///
/// Operands are referred to by their registration index so callers can map
/// the order back onto their own operand list without string lookups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyGraph {
    names: Vec<String>,
    /// Required operands per node (edges out)
    requires: Vec<BTreeSet<usize>>,
    /// Dependent operands per node (edges in)
    dependents: Vec<BTreeSet<usize>>,
    order: Vec<usize>,
    layers: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build and validate a graph from `(name, requires)` pairs in
    /// registration order
    pub fn build<N, R>(nodes: impl IntoIterator<Item = (N, R)>) -> Result<Self, Error>
    where
        N: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let nodes: Vec<(String, Vec<String>)> = nodes
            .into_iter()
            .map(|(n, r)| (n.into(), r.into_iter().map(Into::into).collect()))
            .collect();

        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, (name, _)) in nodes.iter().enumerate() {
            if index.insert(name.as_str(), i).is_some() {
                return Err(Error::DuplicateOperand(name.clone()));
            }
        }

        let mut requires = vec![BTreeSet::new(); nodes.len()];
        let mut dependents = vec![BTreeSet::new(); nodes.len()];
        for (i, (name, reqs)) in nodes.iter().enumerate() {
            for req in reqs {
                if req == name {
                    return Err(Error::CyclicDependency {
                        cycle: vec![name.clone(), name.clone()],
                    });
                }
                let j = *index.get(req.as_str()).ok_or_else(|| Error::UnknownDependency {
                    operand: name.clone(),
                    requires: req.clone(),
                })?;
                requires[i].insert(j);
                dependents[j].insert(i);
            }
        }

        let names: Vec<String> = nodes.into_iter().map(|(n, _)| n).collect();
        let (order, depth) = topological_order(&requires, &dependents);

        if order.len() < names.len() {
            let cycle = find_cycle(&requires, &order)
                .into_iter()
                .map(|i| names[i].clone())
                .collect();
            return Err(Error::CyclicDependency { cycle });
        }

        let mut layers: Vec<Vec<usize>> = Vec::new();
        for &i in &order {
            let d = depth[i];
            if layers.len() <= d {
                layers.resize_with(d + 1, Vec::new);
            }
            layers[d].push(i);
        }
        for layer in &mut layers {
            layer.sort_unstable();
        }

        Ok(Self {
            names,
            requires,
            dependents,
            order,
            layers,
        })
    }

    /// Registration indices in execution order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Registration indices grouped by dependency depth
    ///
    /// Every operand in layer `n` only requires operands in layers `< n`.
    pub fn layers(&self) -> &[Vec<usize>] {
        &self.layers
    }

    /// Operand names in execution order
    pub fn ordered_names(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.names[i].as_str()).collect()
    }

    /// Names of the operands `name` requires
    pub fn requirements_of(&self, name: &str) -> Vec<&str> {
        self.lookup(name, &self.requires)
    }

    /// Names of the operands that require `name`
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.lookup(name, &self.dependents)
    }

    /// Number of registered operands
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when no operands are registered
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn lookup<'a>(&'a self, name: &str, edges: &'a [BTreeSet<usize>]) -> Vec<&'a str> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| edges[i].iter().map(|&j| self.names[j].as_str()).collect())
            .unwrap_or_default()
    }
}

/// Kahn's algorithm with a BTreeSet frontier so ties go to the lowest
/// registration index. Returns the (possibly partial) order and each
/// node's depth.
fn topological_order(
    requires: &[BTreeSet<usize>],
    dependents: &[BTreeSet<usize>],
) -> (Vec<usize>, Vec<usize>) {
    let mut remaining: Vec<usize> = requires.iter().map(BTreeSet::len).collect();
    let mut depth = vec![0usize; requires.len()];
    let mut ready: BTreeSet<usize> = (0..requires.len()).filter(|&i| remaining[i] == 0).collect();
    let mut order = Vec::with_capacity(requires.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &d in &dependents[i] {
            depth[d] = depth[d].max(depth[i] + 1);
            remaining[d] -= 1;
            if remaining[d] == 0 {
                ready.insert(d);
            }
        }
    }

    (order, depth)
}

/// Walk requirement edges among the nodes Kahn's algorithm could not place
/// until a node repeats. Every such node has at least one unplaced
/// requirement, so the walk always closes a cycle.
fn find_cycle(requires: &[BTreeSet<usize>], placed: &[usize]) -> Vec<usize> {
    let placed: BTreeSet<usize> = placed.iter().copied().collect();
    let Some(start) = (0..requires.len()).find(|i| !placed.contains(i)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(&next) = requires[current].iter().find(|j| !placed.contains(j)) else {
            return path;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle = path.split_off(pos);
            cycle.push(next);
            return cycle;
        }
        path.push(next);
        current = next;
    }
}
