//! Dependency - Reference graph between exported resources

use std::collections::{BTreeMap, BTreeSet};

use crate::resource::ResourceAddress;

/// Dependency graph built from resolved references
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Resource -> resources it references
    pub edges: BTreeMap<ResourceAddress, BTreeSet<ResourceAddress>>,
    /// Reverse edges: target -> resources that reference it
    pub reverse_edges: BTreeMap<ResourceAddress, BTreeSet<ResourceAddress>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency edge. Self references are not edges.
    pub fn add_edge(&mut self, from: ResourceAddress, target: ResourceAddress) {
        if from == target {
            return;
        }
        self.reverse_edges
            .entry(target.clone())
            .or_default()
            .insert(from.clone());
        self.edges.entry(from).or_default().insert(target);
    }

    /// Direct dependencies of a resource
    pub fn dependencies_of(&self, resource: &ResourceAddress) -> impl Iterator<Item = &ResourceAddress> {
        self.edges.get(resource).into_iter().flatten()
    }

    /// Resources that depend on this resource
    pub fn dependents_of(&self, resource: &ResourceAddress) -> impl Iterator<Item = &ResourceAddress> {
        self.reverse_edges.get(resource).into_iter().flatten()
    }

    /// Return the nodes of one cycle, if the graph has any
    pub fn find_cycle(&self) -> Option<Vec<ResourceAddress>> {
        let mut visited = BTreeSet::new();
        let mut stack = Vec::new();

        for node in self.edges.keys() {
            if let Some(cycle) = self.find_cycle_util(node, &mut visited, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    pub fn has_cycle(&self) -> bool {
        self.find_cycle().is_some()
    }

    fn find_cycle_util<'a>(
        &'a self,
        node: &'a ResourceAddress,
        visited: &mut BTreeSet<&'a ResourceAddress>,
        stack: &mut Vec<&'a ResourceAddress>,
    ) -> Option<Vec<ResourceAddress>> {
        if let Some(pos) = stack.iter().position(|n| *n == node) {
            return Some(stack[pos..].iter().map(|n| (*n).clone()).collect());
        }
        if !visited.insert(node) {
            return None;
        }

        stack.push(node);
        for dep in self.dependencies_of(node) {
            if let Some(cycle) = self.find_cycle_util(dep, visited, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        None
    }
}
