//! Dependency graph construction (`spec.md` §4.4).
//!
//! A node exists per calculation (`R{id}`) and per unconverted module
//! (`M{idx}`). Converted modules are pre-rewritten away: every `M{m}.{o}`
//! occurring in a formula is substituted with the concrete `R{n}` named by
//! `_mRefMap` before dependency extraction runs, so converted modules never
//! become graph nodes.

use rustc_hash::{FxHashMap, FxHashSet};

use modelcore_common::reference::Reference;
use modelcore_parse::{parse, Expr};

use crate::model::{CalculationsDoc, Module, ParamValue};

/// A fully-built dependency graph, ready for `cluster` and `scheduler`.
pub struct Graph {
    pub nodes: Vec<String>,
    /// `depends_on[v]` is the set of nodes `v` must be computed after.
    pub depends_on: FxHashMap<String, FxHashSet<String>>,
    /// R-refs appearing strictly inside `SHIFT`/`PREVSUM`/`PREVVAL` in a
    /// calculation's formula (`spec.md` §4.5).
    pub shift_targets: FxHashMap<String, FxHashSet<String>>,
    /// Parsed (and `_mRefMap`-rewritten) formula for each calculation node.
    pub formulas: FxHashMap<String, Expr>,
    /// Unconverted modules, keyed by their node id, with declared index.
    pub modules: FxHashMap<String, (u32, Module)>,
    pub parse_errors: Vec<(String, String)>,
}

/// If `name` names a graph node (`R{n}` or `M{idx}[.{out}]`), return its
/// node id (`M{idx}.{out}` collapses to `M{idx}`). Reference-map-only
/// prefixes (`V S C L F I T`) return `None`, same as any string that
/// doesn't parse as a reference at all.
fn node_ref(name: &str) -> Option<String> {
    Reference::parse(name)?.node_name()
}

fn collect_all_refs(expr: &Expr, out: &mut FxHashSet<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Ref(name) => {
            if let Some(n) = node_ref(name) {
                out.insert(n);
            }
        }
        Expr::Unary { expr, .. } => collect_all_refs(expr, out),
        Expr::Binary { left, right, .. } => {
            collect_all_refs(left, out);
            collect_all_refs(right, out);
        }
        Expr::Call { args, .. } => {
            for a in args {
                collect_all_refs(a, out);
            }
        }
    }
}

fn is_lag_fn(name: &str) -> bool {
    matches!(name, "SHIFT" | "PREVSUM" | "PREVVAL")
}

/// Dependencies from the formula with every `SHIFT`/`PREVSUM`/`PREVVAL`
/// call stripped entirely (`spec.md` §4.4).
fn collect_real_deps(expr: &Expr, out: &mut FxHashSet<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Ref(name) => {
            if let Some(n) = node_ref(name) {
                out.insert(n);
            }
        }
        Expr::Unary { expr, .. } => collect_real_deps(expr, out),
        Expr::Binary { left, right, .. } => {
            collect_real_deps(left, out);
            collect_real_deps(right, out);
        }
        Expr::Call { name, args } => {
            if is_lag_fn(name) {
                return;
            }
            for a in args {
                collect_real_deps(a, out);
            }
        }
    }
}

/// R-refs that appear strictly inside a `SHIFT`/`PREVSUM`/`PREVVAL` call
/// anywhere in the formula (`spec.md` §4.5).
fn collect_shift_targets(expr: &Expr, out: &mut FxHashSet<String>) {
    match expr {
        Expr::Number(_) | Expr::Ref(_) => {}
        Expr::Unary { expr, .. } => collect_shift_targets(expr, out),
        Expr::Binary { left, right, .. } => {
            collect_shift_targets(left, out);
            collect_shift_targets(right, out);
        }
        Expr::Call { name, args } => {
            if is_lag_fn(name) {
                for a in args {
                    collect_all_refs(a, out);
                }
            } else {
                for a in args {
                    collect_shift_targets(a, out);
                }
            }
        }
    }
}

/// Replace every `Ref` naming a converted-module alias with its mapped
/// `R{n}` (`spec.md` §4.4, "longest-match-first to avoid prefix
/// collisions" — moot here since the tokenizer already returns the longest
/// dotted identifier as a single token).
fn rewrite_m_ref_map(expr: &Expr, m_ref_map: &FxHashMap<String, String>) -> Expr {
    match expr {
        Expr::Number(_) => expr.clone(),
        Expr::Ref(name) => match m_ref_map.get(name) {
            Some(mapped) => Expr::Ref(mapped.clone()),
            None => expr.clone(),
        },
        Expr::Unary { op, expr: inner } => Expr::Unary {
            op: *op,
            expr: Box::new(rewrite_m_ref_map(inner, m_ref_map)),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(rewrite_m_ref_map(left, m_ref_map)),
            right: Box::new(rewrite_m_ref_map(right, m_ref_map)),
        },
        Expr::Call { name, args } => Expr::Call {
            name: name.clone(),
            args: args.iter().map(|a| rewrite_m_ref_map(a, m_ref_map)).collect(),
        },
    }
}

pub fn build(doc: &CalculationsDoc) -> Graph {
    let mut nodes = Vec::new();
    let mut depends_on: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
    let mut shift_targets: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
    let mut formulas = FxHashMap::default();
    let mut modules = FxHashMap::default();
    let mut parse_errors = Vec::new();

    for calc in &doc.calculations {
        let node = calc.node_name();
        let expr = match parse(&calc.formula) {
            Ok(e) => rewrite_m_ref_map(&e, &doc.m_ref_map),
            Err(e) => {
                parse_errors.push((node.clone(), e.to_string()));
                Expr::number(0.0)
            }
        };

        let mut deps = FxHashSet::default();
        collect_real_deps(&expr, &mut deps);
        deps.remove(&node);
        let mut targets = FxHashSet::default();
        collect_shift_targets(&expr, &mut targets);

        nodes.push(node.clone());
        depends_on.insert(node.clone(), deps);
        shift_targets.insert(node.clone(), targets);
        formulas.insert(node, expr);
    }

    for (i, module) in doc.modules.iter().enumerate() {
        if module.converted {
            continue;
        }
        let idx = (i + 1) as u32;
        let node = format!("M{idx}");
        let mut deps = FxHashSet::default();
        for value in module.inputs.values() {
            if let ParamValue::Ref(r) = value {
                // A module input can still name a converted module's
                // pre-conversion alias directly; depend on the `R{n}` it
                // was mapped to, not the now-nonexistent `M{m}` node.
                let resolved = doc.m_ref_map.get(r).map(String::as_str).unwrap_or(r);
                if let Some(n) = node_ref(resolved) {
                    if n != node {
                        deps.insert(n);
                    }
                }
            }
        }
        nodes.push(node.clone());
        depends_on.insert(node.clone(), deps);
        modules.insert(node, (idx, module.clone()));
    }

    Graph {
        nodes,
        depends_on,
        shift_targets,
        formulas,
        modules,
        parse_errors,
    }
}
