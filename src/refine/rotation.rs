use std::collections::HashSet;

use crate::refine::error::RefineError;
use crate::refine::policy::SelectionPolicy;
use crate::refine::types::{EdgeMap, Rotation};

/// Working subset and used set for one edge of one record.
#[derive(Debug, Clone)]
pub struct EdgeState {
    candidates: Vec<String>,
    subset: Vec<String>,
    used: HashSet<String>,
}

impl EdgeState {
    /// Start from the first `k` candidates (fewer if the list is shorter).
    pub fn new(candidates: &[String], k: usize) -> Self {
        let subset: Vec<String> = candidates.iter().take(k).cloned().collect();
        let used = subset.iter().cloned().collect();
        Self {
            candidates: candidates.to_vec(),
            subset,
            used,
        }
    }

    pub fn subset(&self) -> &[String] {
        &self.subset
    }

    pub fn used(&self) -> &HashSet<String> {
        &self.used
    }

    /// Swap one member of the subset for the first unused candidate.
    ///
    /// The subset keeps its length either way: on exhaustion the dropped id
    /// is appended back.
    pub fn rotate(&mut self, edge: &str, policy: &mut dyn SelectionPolicy) -> Rotation {
        if self.subset.is_empty() {
            return Rotation::Exhausted {
                edge: edge.to_string(),
                dropped: None,
            };
        }

        let index = policy.choose_drop(edge, &self.subset);
        let dropped = self.subset.remove(index);

        let next = self
            .candidates
            .iter()
            .find(|id| !self.used.contains(*id))
            .cloned();

        match next {
            Some(added) => {
                self.used.insert(added.clone());
                self.subset.push(added.clone());
                Rotation::Swapped {
                    edge: edge.to_string(),
                    dropped,
                    added,
                }
            }
            None => {
                self.subset.push(dropped.clone());
                Rotation::Exhausted {
                    edge: edge.to_string(),
                    dropped: Some(dropped),
                }
            }
        }
    }
}

/// All per-edge state for the record currently being refined.
#[derive(Debug, Clone)]
pub struct WorkingContext {
    edges: EdgeMap<EdgeState>,
}

impl WorkingContext {
    pub fn new(candidates: &EdgeMap<Vec<String>>, k: usize) -> Self {
        Self {
            edges: candidates.map_values(|ids| EdgeState::new(ids, k)),
        }
    }

    /// Current subsets, in edge order.
    pub fn snapshot(&self) -> EdgeMap<Vec<String>> {
        self.edges.map_values(|state| state.subset.clone())
    }

    /// Let the policy pick an edge and rotate only that edge.
    pub fn rotate(&mut self, policy: &mut dyn SelectionPolicy) -> Result<Rotation, RefineError> {
        let names: Vec<&str> = self.edges.keys().collect();
        if names.is_empty() {
            return Err(RefineError::NoEdges);
        }

        let edge = names[policy.choose_edge(&names)].to_string();
        let state = self.edges.get_mut(&edge).ok_or(RefineError::NoEdges)?;
        Ok(state.rotate(&edge, policy))
    }
}
