//! Dependency-ordered scheduling of named units.
//!
//! A [`DependencyGraph`] holds named nodes in registration order plus
//! `run_after`/`run_before` edges, and resolves them once into a total
//! execution order via topological sort. Nodes with no declared edges keep
//! their registration order. A cycle is a configuration error reported at
//! resolve time; it can never surface mid-run.

use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// ScheduleError
// ---------------------------------------------------------------------------

/// Errors produced while building or resolving a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// The declared edges contain a cycle.
    #[error("dependency cycle among: [{names}]")]
    Cycle {
        /// Comma-separated names of the nodes stuck in the cycle.
        names: String,
    },

    /// An edge references a node that was never registered.
    #[error("'{from}' declares an ordering against unknown node '{name}'")]
    UnknownNode {
        /// The node declaring the edge.
        from: String,
        /// The missing edge target.
        name: String,
    },

    /// Two nodes were registered under the same name.
    #[error("duplicate node name '{name}'")]
    DuplicateNode {
        /// The colliding name.
        name: String,
    },
}

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// Named nodes plus ordering edges, resolved by [`resolve`](Self::resolve).
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    /// `deps[i]` holds the indices that must come before node `i`.
    deps: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, returning its index (registration order).
    pub fn add_node(&mut self, name: &str) -> Result<usize, ScheduleError> {
        if self.index_of(name).is_some() {
            return Err(ScheduleError::DuplicateNode {
                name: name.to_owned(),
            });
        }
        self.nodes.push(name.to_owned());
        self.deps.push(Vec::new());
        Ok(self.nodes.len() - 1)
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of a node by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == name)
    }

    /// Declare that `node` must run after `after`.
    pub fn run_after(&mut self, node: &str, after: &str) -> Result<(), ScheduleError> {
        let node_idx = self.require(node, node)?;
        let after_idx = self.require(node, after)?;
        if !self.deps[node_idx].contains(&after_idx) {
            self.deps[node_idx].push(after_idx);
        }
        Ok(())
    }

    /// Declare that `node` must run before `before`.
    pub fn run_before(&mut self, node: &str, before: &str) -> Result<(), ScheduleError> {
        let before_idx = self.require(node, before)?;
        let node_idx = self.require(node, node)?;
        if !self.deps[before_idx].contains(&node_idx) {
            self.deps[before_idx].push(node_idx);
        }
        Ok(())
    }

    /// Resolve a total order over all nodes.
    ///
    /// Kahn's algorithm with the ready set ordered by registration index, so
    /// unconstrained nodes execute in the order they were registered and the
    /// result is deterministic.
    pub fn resolve(&self) -> Result<Vec<usize>, ScheduleError> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (node, deps) in self.deps.iter().enumerate() {
            indegree[node] = deps.len();
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(&next) = ready.iter().next() {
            ready.remove(&next);
            order.push(next);
            for &dependent in &dependents[next] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < n {
            let stuck: Vec<&str> = (0..n)
                .filter(|i| !order.contains(i))
                .map(|i| self.nodes[i].as_str())
                .collect();
            return Err(ScheduleError::Cycle {
                names: stuck.join(", "),
            });
        }
        Ok(order)
    }

    fn require(&self, from: &str, name: &str) -> Result<usize, ScheduleError> {
        self.index_of(name).ok_or_else(|| ScheduleError::UnknownNode {
            from: from.to_owned(),
            name: name.to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
