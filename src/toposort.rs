//! Topological sorting of dependency graphs
//!
//! Kahn's algorithm over name graphs, used for both the module graph
//! (edges point at imported modules) and the per-module function graph
//! (edges point at rendered functions). Results are in dependency order:
//! dependencies before dependents. Ties are broken by name so orderings
//! and error messages are deterministic.

use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Errors from sorting a dependency graph. `label` names the kind of
/// node ("module" or "function") for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SortError {
    #[error("{label} '{node}' depends on undefined {label} '{dependency}'")]
    UndefinedDependency {
        label: &'static str,
        node: String,
        dependency: String,
    },

    #[error("cycle detected among {label}s: {}", .members.join(", "))]
    Cycle {
        label: &'static str,
        members: Vec<String>,
    },
}

/// Sort `graph` topologically. An edge `node -> dep` means `node`
/// depends on `dep`; the result places every `dep` before `node`.
pub fn topological_sort(
    graph: &HashMap<String, HashSet<String>>,
    label: &'static str,
) -> Result<Vec<String>, SortError> {
    let mut nodes: Vec<&str> = graph.keys().map(String::as_str).collect();
    nodes.sort_unstable();

    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|&n| (n, 0)).collect();
    for &node in &nodes {
        let mut deps: Vec<&str> = graph[node].iter().map(String::as_str).collect();
        deps.sort_unstable();
        for dep in deps {
            match in_degree.get_mut(dep) {
                Some(count) => *count += 1,
                None => {
                    return Err(SortError::UndefinedDependency {
                        label,
                        node: node.to_string(),
                        dependency: dep.to_string(),
                    });
                }
            }
        }
    }

    let mut queue: VecDeque<&str> = nodes
        .iter()
        .copied()
        .filter(|n| in_degree[n] == 0)
        .collect();

    let mut result: Vec<String> = Vec::with_capacity(nodes.len());
    while let Some(node) = queue.pop_front() {
        result.push(node.to_string());
        let mut deps: Vec<&str> = graph[node].iter().map(String::as_str).collect();
        deps.sort_unstable();
        for dep in deps {
            if let Some(count) = in_degree.get_mut(dep) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(dep);
                }
            }
        }
    }

    if result.len() != graph.len() {
        let processed: HashSet<&str> = result.iter().map(String::as_str).collect();
        let mut members: Vec<String> = nodes
            .iter()
            .filter(|n| !processed.contains(**n))
            .map(|n| n.to_string())
            .collect();
        members.sort_unstable();
        return Err(SortError::Cycle { label, members });
    }

    // Kahn's algorithm processed dependents first; flip to dependency order.
    result.reverse();
    Ok(result)
}
