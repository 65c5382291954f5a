//! Topological scheduler (`spec.md` §4.6).
//!
//! A Kahn-style fixed-point relaxation: repeatedly scan the node list and
//! emit every node whose remaining dependencies are already scheduled,
//! until nothing more can progress. A residual (true, non-SHIFT-mediated
//! cycle) is appended in a deterministic order with a warning rather than
//! aborting the pass (`spec.md` §4.10).

use rustc_hash::FxHashSet;

use super::graph::Graph;

pub struct Schedule {
    pub order: Vec<String>,
    pub warnings: Vec<String>,
    /// Nodes left over after relaxation stalled — a true cycle, not one
    /// SHIFT/PREVSUM/PREVVAL explains. Empty when the graph is acyclic.
    pub cyclic_nodes: Vec<String>,
}

pub fn schedule(graph: &Graph) -> Schedule {
    let mut remaining: FxHashSet<String> = graph.nodes.iter().cloned().collect();
    let mut order = Vec::with_capacity(graph.nodes.len());
    let mut warnings = Vec::new();
    let mut cyclic_nodes = Vec::new();

    loop {
        let mut progressed = false;
        for node in &graph.nodes {
            if !remaining.contains(node) {
                continue;
            }
            let ready = graph
                .depends_on
                .get(node)
                .map(|deps| deps.iter().all(|d| !remaining.contains(d)))
                .unwrap_or(true);
            if ready {
                order.push(node.clone());
                remaining.remove(node);
                progressed = true;
            }
        }
        if remaining.is_empty() {
            break;
        }
        if !progressed {
            let mut residual: Vec<String> = remaining.iter().cloned().collect();
            residual.sort();
            warnings.push(format!(
                "circular dependency not explained by SHIFT/PREVSUM/PREVVAL: {}",
                residual.join(", ")
            ));
            cyclic_nodes = residual.clone();
            order.extend(residual);
            break;
        }
    }

    Schedule { order, warnings, cyclic_nodes }
}

/// Per cluster, the member order is the members' relative position in the
/// outer topological sort; the trigger is the last member in that order
/// (`spec.md` §4.5, §4.6, "Trigger" in the glossary).
pub fn cluster_internal_order(order: &[String], members: &[String]) -> Vec<String> {
    let pos: rustc_hash::FxHashMap<&str, usize> =
        order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
    let mut ordered: Vec<String> = members.to_vec();
    ordered.sort_by_key(|m| pos.get(m.as_str()).copied().unwrap_or(usize::MAX));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::build;
    use crate::model::{CalcType, Calculation, CalculationsDoc};

    fn calc(id: u32, formula: &str) -> Calculation {
        Calculation {
            id,
            name: format!("calc{id}"),
            formula: formula.to_string(),
            calc_type: CalcType::Flow,
        }
    }

    #[test]
    fn orders_simple_chain() {
        let doc = CalculationsDoc {
            calculations: vec![calc(1, "R2 + 1"), calc(2, "R3 + 1"), calc(3, "5")],
            ..Default::default()
        };
        let graph = build(&doc);
        let s = schedule(&graph);
        assert!(s.warnings.is_empty());
        let pos = |n: &str| s.order.iter().position(|x| x == n).unwrap();
        assert!(pos("R3") < pos("R2"));
        assert!(pos("R2") < pos("R1"));
    }

    #[test]
    fn true_cycle_is_appended_with_warning() {
        let doc = CalculationsDoc {
            calculations: vec![calc(1, "R2"), calc(2, "R1")],
            ..Default::default()
        };
        let graph = build(&doc);
        let s = schedule(&graph);
        assert_eq!(s.warnings.len(), 1);
        assert_eq!(s.order.len(), 2);
    }
}
