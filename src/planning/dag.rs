//! Dependency-graph helpers
//!
//! Cycle detection over subgoal dependencies (DFS with an explicit recursion
//! stack) and the textual node/edge export consumed by external graph tooling.

use std::collections::{HashMap, HashSet};

use crate::planning::decomposer::Subgoal;
use crate::planning::reasoning::Thought;

/// Find one cycle in the subgoal dependency graph, if any. Returns the ids
/// along the cycle, ending with the id that closed it. Dependencies pointing
/// outside the subgoal set are ignored; they are reported by a separate
/// criticism, not treated as edges.
pub fn find_cycle(subgoals: &[Subgoal]) -> Option<Vec<String>> {
    let by_id: HashMap<&str, &Subgoal> =
        subgoals.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut on_stack: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a Subgoal>,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
        on_stack: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(id);
        stack.push(id);
        on_stack.insert(id);

        if let Some(subgoal) = by_id.get(id) {
            for dep in &subgoal.dependencies {
                let dep = dep.as_str();
                if !by_id.contains_key(dep) {
                    continue;
                }
                if on_stack.contains(dep) {
                    // Back-edge: slice the stack from the first occurrence.
                    let start = stack.iter().position(|&s| s == dep).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dep.to_string());
                    return Some(cycle);
                }
                if !visited.contains(dep) {
                    if let Some(cycle) = visit(dep, by_id, visited, stack, on_stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        on_stack.remove(id);
        None
    }

    for subgoal in subgoals {
        let id = subgoal.id.as_str();
        if !visited.contains(id) {
            if let Some(cycle) = visit(id, &by_id, &mut visited, &mut stack, &mut on_stack) {
                return Some(cycle);
            }
        }
    }

    None
}

/// Whether the subgoal dependency graph contains a cycle.
pub fn has_cycle(subgoals: &[Subgoal]) -> bool {
    find_cycle(subgoals).is_some()
}

/// Textual node/edge list over subgoal and thought ids. Consumed by external
/// tooling only; the format is a plain line-oriented listing.
pub fn export_graph(subgoals: &[Subgoal], thoughts: &[Thought]) -> String {
    let mut out = String::new();

    for subgoal in subgoals {
        out.push_str(&format!("node subgoal {}\n", subgoal.id));
    }
    for thought in thoughts {
        out.push_str(&format!("node thought {}\n", thought.id));
    }

    for subgoal in subgoals {
        for dep in &subgoal.dependencies {
            out.push_str(&format!("edge {} -> {}\n", dep, subgoal.id));
        }
    }
    for thought in thoughts {
        for dep in &thought.dependencies {
            out.push_str(&format!("edge {} -> {}\n", dep, thought.id));
        }
        out.push_str(&format!("edge {} -> {}\n", thought.subgoal_id, thought.id));
    }

    out
}
