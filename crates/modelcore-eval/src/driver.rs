//! The top-level pass (`spec.md` §4.7, §4.10): timeline, reference map,
//! dependency graph, clustering, scheduling, and evaluation in one call.
//!
//! `run_model` never returns `Err` for formula-level trouble — a malformed
//! formula, an unresolved reference, a true cycle — those all collapse to
//! zero or a deterministic fallback and are reported in [`RunResult::errors`]
//! instead. `Result` is reserved for whole-pass failures the caller must
//! stop on (currently none are raised; kept for forward compatibility with
//! `spec.md` §6.4's `InvalidModel` category).

use rustc_hash::FxHashMap;

use modelcore_common::error::{EngineError, EngineErrorKind};

use crate::context::Context;
use crate::engine::{cluster, graph, scheduler};
use crate::interpreter::evaluate_non_cluster;
use crate::model::{CalculationsDoc, Module, ModelInputs};
use crate::modules;
use crate::options::EvalOptions;
use crate::refmap::build_reference_map;
use crate::timeline::Timeline;

/// Everything produced by one run, keyed the way the reference map and
/// graph key their nodes (`spec.md` §6.2).
#[derive(Debug, Clone)]
pub struct RunResult {
    pub timeline: Timeline,
    pub reference_map: Context,
    /// Every `R{id}` calculation's resolved period vector.
    pub calculation_results: Context,
    /// `M{idx}.{output}` for every unconverted module instance, plus the
    /// original `M{m}.{o}` alias of every converted module `calculations.
    /// m_ref_map` points at an `R{n}` (`spec.md` §4.4) — anything that still
    /// keys off the pre-conversion alias directly (a module input, an
    /// external caller) sees the same vector as the calculation it was
    /// rewritten to.
    pub module_outputs: Context,
    /// The scheduler's final node order (`spec.md` §4.6).
    pub sorted_node_order: Vec<String>,
    /// SHIFT-cycle clusters as resolved node-id groups (`spec.md` §4.5).
    pub cluster_debug: Vec<Vec<String>>,
    /// Human-readable notes from clustering/scheduling, kept separately
    /// from `errors` since none of these indicate a pass failure.
    pub eval_debug: Vec<String>,
    pub errors: Vec<EngineError>,
}

fn publish_module_outputs(
    idx: u32,
    module: &Module,
    outputs: Vec<Vec<f64>>,
    ctx: &mut Context,
    module_outputs: &mut Context,
) {
    let names = modules::output_names(&module.template_id);
    for (name, vector) in names.iter().zip(outputs.into_iter()) {
        let key = format!("M{idx}.{name}");
        ctx.insert(key.clone(), vector.clone());
        module_outputs.insert(key, vector);
    }
}

/// Convenience wrapper over [`run_model_with_options`] with [`EvalOptions::default`].
pub fn run_model(inputs: &ModelInputs, calculations: &CalculationsDoc) -> RunResult {
    run_model_with_options(inputs, calculations, &EvalOptions::default())
}

pub fn run_model_with_options(
    inputs: &ModelInputs,
    calculations: &CalculationsDoc,
    options: &EvalOptions,
) -> RunResult {
    let timeline = Timeline::build(&inputs.config);
    let periods = timeline.periods as usize;
    let reference_map = build_reference_map(inputs, &timeline);

    let mut ctx: Context = reference_map.clone();
    let mut errors: Vec<EngineError> = Vec::new();
    let mut eval_debug: Vec<String> = Vec::new();
    let mut module_outputs: Context = FxHashMap::default();

    // Reverse of `calculations.m_ref_map`: every original `M{m}.{o}` alias a
    // converted module's formula was rewritten away from, keyed by the
    // `R{n}` node it now lives under (`spec.md` §4.4).
    let mut aliases_of: FxHashMap<String, Vec<String>> = FxHashMap::default();
    for (alias, target) in &calculations.m_ref_map {
        aliases_of.entry(target.clone()).or_default().push(alias.clone());
    }
    let publish_aliases = |node: &str, ctx: &mut Context, module_outputs: &mut Context| {
        let Some(aliases) = aliases_of.get(node) else {
            return;
        };
        let Some(vector) = ctx.get(node).cloned() else {
            return;
        };
        for alias in aliases {
            ctx.insert(alias.clone(), vector.clone());
            module_outputs.insert(alias.clone(), vector.clone());
        }
    };

    let mut g = graph::build(calculations);
    for (node, msg) in &g.parse_errors {
        #[cfg(feature = "tracing")]
        tracing::warn!(node = %node, error = %msg, "formula failed to parse; treated as 0");
        errors.push(EngineError::new(EngineErrorKind::MalformedFormula(msg.clone())).with_node(node.clone()));
    }

    let clusters = cluster::detect_clusters(&mut g);
    #[cfg(feature = "tracing")]
    tracing::debug!(count = clusters.len(), "SHIFT-cycle clusters detected");

    let schedule = scheduler::schedule(&g);
    for warning in &schedule.warnings {
        #[cfg(feature = "tracing")]
        tracing::warn!(nodes = %schedule.cyclic_nodes.join(", "), "true cycle left unresolved");
        errors.push(EngineError::new(EngineErrorKind::CircularDependency(schedule.cyclic_nodes.clone())));
        eval_debug.push(warning.clone());
    }

    // Every cluster's members may have scattered positions in the outer
    // order (a member with no real deps of its own can land early); the
    // whole cluster is only safe to evaluate once every member's external
    // real dependencies have been scheduled, which `spec.md` §4.6 guarantees
    // happens by the position of the *last*-scheduled member — the trigger.
    let order_pos: FxHashMap<&str, usize> =
        schedule.order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
    let mut node_to_cluster: FxHashMap<&str, usize> = FxHashMap::default();
    let mut trigger_node: Vec<&str> = Vec::with_capacity(clusters.len());
    for (ci, members) in clusters.iter().enumerate() {
        for m in members {
            node_to_cluster.insert(m.as_str(), ci);
        }
        let trigger = members
            .iter()
            .max_by_key(|m| order_pos.get(m.as_str()).copied().unwrap_or(0))
            .expect("clusters are never empty");
        trigger_node.push(trigger.as_str());
    }

    for node in &schedule.order {
        if let Some(&ci) = node_to_cluster.get(node.as_str()) {
            if node.as_str() == trigger_node[ci] {
                let internal_order = scheduler::cluster_internal_order(&schedule.order, &clusters[ci]);
                crate::engine::cluster_eval::evaluate_cluster(&internal_order, &g.formulas, &timeline, &mut ctx);
                for member in &clusters[ci] {
                    publish_aliases(member, &mut ctx, &mut module_outputs);
                }
            }
            continue;
        }

        if let Some((idx, module)) = g.modules.get(node) {
            if !module.enabled {
                let zeros = vec![vec![0.0; periods]; modules::output_names(&module.template_id).len()];
                publish_module_outputs(*idx, module, zeros, &mut ctx, &mut module_outputs);
                continue;
            }
            let outputs = modules::evaluate(&module.template_id, &module.inputs, &ctx, periods, options);
            publish_module_outputs(*idx, module, outputs, &mut ctx, &mut module_outputs);
            continue;
        }

        if let Some(expr) = g.formulas.get(node) {
            let vector = evaluate_non_cluster(expr, periods, &timeline, &ctx);
            ctx.insert(node.clone(), vector);
            publish_aliases(node, &mut ctx, &mut module_outputs);
        }
    }

    let calculation_results: Context = calculations
        .calculations
        .iter()
        .map(|c| c.node_name())
        .filter_map(|node| ctx.get(&node).map(|v| (node.clone(), v.clone())))
        .collect();

    RunResult {
        timeline,
        reference_map,
        calculation_results,
        module_outputs,
        sorted_node_order: schedule.order,
        cluster_debug: clusters,
        eval_debug,
        errors,
    }
}
