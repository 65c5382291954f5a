//! SHIFT-cycle detection and clustering (`spec.md` §4.5).
//!
//! A cluster is a set of calculation nodes whose mutual dependency exists
//! only through `SHIFT`/`PREVSUM`/`PREVVAL`. Detecting one: a calculation
//! `X` shift-reads `T` (e.g. an opening balance reading last period's
//! closing balance), and `T` *already* really (non-lag) depends on `X`
//! transitively — i.e. `X` is one of `T`'s real ancestors, so the lag read
//! closes a loop. The cluster core is every node on that real dependency
//! path: nodes `T` depends on that themselves depend on `X`.

use rustc_hash::{FxHashMap, FxHashSet};

use super::graph::Graph;

struct UnionFind {
    parent: FxHashMap<String, String>,
}

impl UnionFind {
    fn new() -> Self {
        UnionFind {
            parent: FxHashMap::default(),
        }
    }

    fn find(&mut self, x: &str) -> String {
        let p = self
            .parent
            .entry(x.to_string())
            .or_insert_with(|| x.to_string())
            .clone();
        if p == x {
            p
        } else {
            let root = self.find(&p);
            self.parent.insert(x.to_string(), root.clone());
            root
        }
    }

    fn union(&mut self, a: &str, b: &str) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}

/// Nodes reachable from `start` by following `depends_on` edges (the
/// transitive prerequisites of `start`, including `start` itself).
fn ancestors(depends_on: &FxHashMap<String, FxHashSet<String>>, start: &str) -> FxHashSet<String> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![start.to_string()];
    seen.insert(start.to_string());
    while let Some(n) = stack.pop() {
        if let Some(deps) = depends_on.get(&n) {
            for d in deps {
                if seen.insert(d.clone()) {
                    stack.push(d.clone());
                }
            }
        }
    }
    seen
}

/// Nodes reachable from `start` by following `depends_on` edges in reverse
/// (the transitive dependents of `start`, including `start` itself).
fn descendants(reverse: &FxHashMap<String, FxHashSet<String>>, start: &str) -> FxHashSet<String> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![start.to_string()];
    seen.insert(start.to_string());
    while let Some(n) = stack.pop() {
        if let Some(deps) = reverse.get(&n) {
            for d in deps {
                if seen.insert(d.clone()) {
                    stack.push(d.clone());
                }
            }
        }
    }
    seen
}

/// Detects SHIFT-mediated cycles, merges overlapping ones, adds the
/// non-cyclical lag edges and the external-dependence-on-cluster edges, and
/// returns the final cluster membership. Mutates `graph.depends_on` in
/// place.
pub fn detect_clusters(graph: &mut Graph) -> Vec<Vec<String>> {
    let node_set: FxHashSet<String> = graph.nodes.iter().cloned().collect();
    let mut uf = UnionFind::new();
    let mut touched: FxHashSet<String> = FxHashSet::default();
    let mut extra_lag_edges: Vec<(String, String)> = Vec::new();

    // Evaluate cyclicality against the graph as extracted (real edges
    // only); added lag edges don't participate in further shift checks.
    let snapshot_depends_on = graph.depends_on.clone();
    let snapshot_reverse = {
        let mut reverse: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
        for (node, deps) in &snapshot_depends_on {
            for d in deps {
                reverse.entry(d.clone()).or_default().insert(node.clone());
            }
        }
        reverse
    };

    for x in &graph.nodes {
        let Some(targets) = graph.shift_targets.get(x) else {
            continue;
        };
        for t in targets {
            if !node_set.contains(t) {
                continue;
            }
            if t == x {
                // Pure self-lag: a trivial one-member cluster.
                touched.insert(x.clone());
                uf.find(x);
                continue;
            }
            // `x` shift-reads `t`. This is a real cycle, not just a lag,
            // when `t` *really* (non-lag) depends on `x` transitively —
            // i.e. `x` is one of `t`'s real ancestors.
            let anc_t = ancestors(&snapshot_depends_on, t);
            if anc_t.contains(x) {
                let desc_x = descendants(&snapshot_reverse, x);
                let core: Vec<String> = anc_t.intersection(&desc_x).cloned().collect();
                for n in &core {
                    uf.union(x, n);
                    touched.insert(n.clone());
                }
                touched.insert(x.clone());
                touched.insert(t.clone());
                uf.union(x, t);
            } else {
                extra_lag_edges.push((x.clone(), t.clone()));
            }
        }
    }

    for (x, t) in extra_lag_edges {
        graph.depends_on.entry(x).or_default().insert(t);
    }

    let mut groups: FxHashMap<String, Vec<String>> = FxHashMap::default();
    for n in &touched {
        let root = uf.find(n);
        groups.entry(root).or_default().push(n.clone());
    }
    let mut clusters: Vec<Vec<String>> = groups.into_values().collect();
    for c in &mut clusters {
        c.sort();
    }
    clusters.sort();

    // External dependence on clusters (spec.md §4.5): any external node
    // depending on one member must be made to depend on every member.
    for cluster in &clusters {
        let members: FxHashSet<String> = cluster.iter().cloned().collect();
        for node in &graph.nodes {
            if members.contains(node) {
                continue;
            }
            let depends_on_some_member = graph
                .depends_on
                .get(node)
                .map(|d| d.intersection(&members).next().is_some())
                .unwrap_or(false);
            if depends_on_some_member {
                let entry = graph.depends_on.entry(node.clone()).or_default();
                for m in &members {
                    entry.insert(m.clone());
                }
            }
        }
    }

    clusters
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
    fn detects_opening_closing_cluster() {
        let doc = CalculationsDoc {
            calculations: vec![
                calc(80, "SHIFT(R84,1)"),
                calc(81, "0"),
                calc(82, "0"),
                calc(84, "R80 + R81 - R82"),
            ],
            ..Default::default()
        };
        let mut graph = build(&doc);
        let clusters = detect_clusters(&mut graph);
        assert_eq!(clusters.len(), 1);
        let mut members = clusters[0].clone();
        members.sort();
        assert_eq!(members, vec!["R80".to_string(), "R84".to_string()]);
    }

    #[test]
    fn non_cyclical_shift_adds_lag_edge_only() {
        let doc = CalculationsDoc {
            calculations: vec![calc(1, "SHIFT(R2,1)"), calc(2, "10")],
            ..Default::default()
        };
        let mut graph = build(&doc);
        let clusters = detect_clusters(&mut graph);
        assert!(clusters.is_empty());
        assert!(graph.depends_on["R1"].contains("R2"));
    }
}
