//! Full `run_model` passes, not just the pieces in isolation.

use rustc_hash::FxHashMap;

use modelcore_eval::{
    run_model, CalcType, Calculation, CalculationsDoc, Config, Module, ModelInputs, ParamValue,
};

fn calc(id: u32, formula: &str, calc_type: CalcType) -> Calculation {
    Calculation {
        id,
        name: format!("calc{id}"),
        formula: formula.to_string(),
        calc_type,
    }
}

fn inputs_for(start_year: i32, start_month: u32, end_year: i32, end_month: u32) -> ModelInputs {
    ModelInputs {
        config: Config { start_year, start_month, end_year, end_month },
        key_periods: vec![],
        input_groups: vec![],
        inputs: vec![],
        indices: vec![],
    }
}

/// `spec.md` §8 scenario S2: an opening/closing balance pair mutually
/// referencing one another through `SHIFT` must cluster, not deadlock the
/// scheduler, and must still agree with closed-form cumulative cash flow.
#[test]
fn opening_closing_cluster_runs_end_to_end() {
    let inputs = inputs_for(2024, 1, 2024, 6);
    let doc = CalculationsDoc {
        calculations: vec![
            calc(80, "SHIFT(R84,1)", CalcType::StockStart),
            calc(81, "10", CalcType::Flow),
            calc(82, "3", CalcType::Flow),
            calc(84, "R80 + R81 - R82", CalcType::Stock),
        ],
        modules: vec![],
        m_ref_map: FxHashMap::default(),
    };

    let result = run_model(&inputs, &doc);
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    assert_eq!(result.cluster_debug.len(), 1);

    let closing = &result.calculation_results["R84"];
    let expected: Vec<f64> = (1..=6).map(|n| (n as f64) * (10.0 - 3.0)).collect();
    for (got, want) in closing.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9, "{closing:?}");
    }

    let opening = &result.calculation_results["R80"];
    assert_eq!(opening[0], 0.0);
    assert!((opening[1] - closing[0]).abs() < 1e-9);
}

/// A plain acyclic chain schedules and evaluates in dependency order.
#[test]
fn simple_chain_evaluates_in_order() {
    let inputs = inputs_for(2024, 1, 2024, 3);
    let doc = CalculationsDoc {
        calculations: vec![
            calc(1, "R2 * 2", CalcType::Flow),
            calc(2, "R3 + 1", CalcType::Flow),
            calc(3, "5", CalcType::Flow),
        ],
        modules: vec![],
        m_ref_map: FxHashMap::default(),
    };
    let result = run_model(&inputs, &doc);
    assert!(result.errors.is_empty());
    assert!(result.cluster_debug.is_empty());
    assert_eq!(result.calculation_results["R3"], vec![5.0, 5.0, 5.0]);
    assert_eq!(result.calculation_results["R2"], vec![6.0, 6.0, 6.0]);
    assert_eq!(result.calculation_results["R1"], vec![12.0, 12.0, 12.0]);
}

/// A true (non-SHIFT) cycle is reported as a warning and never aborts the
/// pass — every node still gets an output, per `spec.md` §4.10.
#[test]
fn true_cycle_is_reported_not_fatal() {
    let inputs = inputs_for(2024, 1, 2024, 1);
    let doc = CalculationsDoc {
        calculations: vec![
            calc(1, "R2 + 1", CalcType::Flow),
            calc(2, "R1 + 1", CalcType::Flow),
        ],
        modules: vec![],
        m_ref_map: FxHashMap::default(),
    };
    let result = run_model(&inputs, &doc);
    assert!(!result.errors.is_empty());
    assert!(result.calculation_results.contains_key("R1"));
    assert!(result.calculation_results.contains_key("R2"));
}

/// An unconverted module instance's outputs are published as `M{idx}.{name}`
/// and visible to downstream calculations.
#[test]
fn unconverted_module_outputs_feed_downstream_calculations() {
    let inputs = inputs_for(2024, 1, 2025, 12);
    let mut module_inputs: FxHashMap<String, ParamValue> = FxHashMap::default();
    module_inputs.insert("additions".to_string(), ParamValue::Ref("S1".into()));
    module_inputs.insert("opsFlag".to_string(), ParamValue::Ref("S2".into()));
    module_inputs.insert("usefulLifeYears".to_string(), ParamValue::Number(10.0));

    let module = Module {
        template_id: "depreciation".to_string(),
        name: "Plant depreciation".to_string(),
        inputs: module_inputs,
        enabled: true,
        converted: false,
    };

    let doc = CalculationsDoc {
        calculations: vec![calc(1, "M1.depreciation * 12", CalcType::Flow)],
        modules: vec![module],
        m_ref_map: FxHashMap::default(),
    };

    let result = run_model(&inputs, &doc);
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    assert!(result.module_outputs.contains_key("M1.depreciation"));
    assert!(result.calculation_results.contains_key("R1"));
}

/// A converted module's pre-conversion alias (`M{m}.{o}`) is published
/// alongside the `R{n}` `calculations.m_ref_map` rewrote it to, so a module
/// input that still names the alias directly resolves instead of zero-filling.
#[test]
fn converted_module_alias_resolves_for_downstream_module_input() {
    let inputs = inputs_for(2024, 1, 2024, 3);

    // `modules[0]` is already converted (its logic lives in `R1` now);
    // `M1.value` is its pre-conversion alias.
    let converted = Module {
        template_id: "gst".to_string(),
        name: "Converted placeholder".to_string(),
        inputs: FxHashMap::default(),
        enabled: true,
        converted: true,
    };

    let mut depreciation_inputs: FxHashMap<String, ParamValue> = FxHashMap::default();
    depreciation_inputs.insert("additions".to_string(), ParamValue::Ref("M1.value".into()));
    depreciation_inputs.insert("opsFlag".to_string(), ParamValue::Number(1.0));
    depreciation_inputs.insert("usefulLifeYears".to_string(), ParamValue::Number(10.0));
    let depreciation = Module {
        template_id: "depreciation".to_string(),
        name: "Plant depreciation".to_string(),
        inputs: depreciation_inputs,
        enabled: true,
        converted: false,
    };

    let mut m_ref_map: FxHashMap<String, String> = FxHashMap::default();
    m_ref_map.insert("M1.value".to_string(), "R1".to_string());

    let doc = CalculationsDoc {
        calculations: vec![calc(1, "10", CalcType::Flow)],
        modules: vec![converted, depreciation],
        m_ref_map,
    };

    let result = run_model(&inputs, &doc);
    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);

    assert_eq!(result.module_outputs["M1.value"], result.calculation_results["R1"]);
    assert_eq!(result.module_outputs["M1.value"], vec![10.0, 10.0, 10.0]);
    assert_eq!(result.module_outputs["M2.addition"][0], 10.0);
}

/// A module with a malformed formula elsewhere in the doc doesn't prevent
/// the rest of the model from evaluating.
#[test]
fn malformed_formula_is_isolated_and_recorded() {
    let inputs = inputs_for(2024, 1, 2024, 1);
    let doc = CalculationsDoc {
        calculations: vec![calc(1, "5", CalcType::Flow), calc(2, "((1+", CalcType::Flow)],
        modules: vec![],
        m_ref_map: FxHashMap::default(),
    };
    let result = run_model(&inputs, &doc);
    assert!(!result.errors.is_empty());
    assert_eq!(result.calculation_results["R1"], vec![5.0]);
    assert_eq!(result.calculation_results["R2"], vec![0.0]);
}
