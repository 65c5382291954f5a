//! Module templates (`spec.md` §4.9). Each template is a closed-form
//! evaluator over an unconverted module's resolved input vectors, except
//! [`debt_sizing`], the one iterative solver.
//!
//! A template's output list is compile-time data (`spec.md` §9, "Module
//! templates as data"): [`output_names`] and [`evaluate`] are the two facts
//! the driver needs, keyed by `template_id`.

pub mod construction_funding;
pub mod debt_sizing;
pub mod depreciation;
pub mod gst;
pub mod reserve;
pub mod tax_losses;

use rustc_hash::FxHashMap;

use crate::context::Context;
use crate::model::ParamValue;
use crate::options::EvalOptions;

/// Resolve a module parameter to a full `periods`-long vector: a numeric
/// literal broadcasts, a reference resolves against the context (zero-fill
/// if absent, per `spec.md` §4.2's missing-reference rule).
pub fn resolve_vector(value: Option<&ParamValue>, ctx: &Context, periods: usize) -> Vec<f64> {
    match value {
        Some(ParamValue::Number(n)) => vec![*n; periods],
        Some(ParamValue::Ref(name)) => ctx
            .get(name)
            .cloned()
            .unwrap_or_else(|| vec![0.0; periods]),
        None => vec![0.0; periods],
    }
}

/// Resolve a module parameter expected to be a single scalar: a literal
/// passes through; a reference takes its first period's value.
pub fn resolve_scalar(value: Option<&ParamValue>, ctx: &Context) -> f64 {
    match value {
        Some(ParamValue::Number(n)) => *n,
        Some(ParamValue::Ref(name)) => ctx.get(name).and_then(|v| v.first()).copied().unwrap_or(0.0),
        None => 0.0,
    }
}

pub fn first_index_where(flag: &[f64], pred: impl Fn(f64) -> bool) -> Option<usize> {
    flag.iter().position(|v| pred(*v))
}

pub fn last_index_where(flag: &[f64], pred: impl Fn(f64) -> bool) -> Option<usize> {
    flag.iter().rposition(|v| pred(*v))
}

pub fn output_names(template_id: &str) -> &'static [&'static str] {
    match template_id {
        "depreciation" => &["opening", "addition", "depreciation", "accumulated", "closing"],
        "reserve" => &["opening", "funding", "drawdown", "release", "closing"],
        "gst" => &["gst_amount", "gst_paid", "gst_received", "receivable_closing"],
        "tax_losses" => &["generated", "utilised", "closing", "net_taxable", "tax"],
        "construction_funding" => &[
            "total_uses_ex_idc",
            "senior_debt",
            "debt_drawdown",
            "gearing_pct",
            "idc",
            "cumulative_idc",
            "total_uses_incl_idc",
            "equity",
            "equity_drawdown",
        ],
        "debt_sizing" => &[
            "sized_debt",
            "opening_balance",
            "interest_payment",
            "principal_payment",
            "debt_service",
            "closing_balance",
            "period_dscr",
            "cumulative_principal",
        ],
        _ => &[],
    }
}

/// Evaluate one unconverted module instance. Unknown `template_id`s yield
/// zeroed outputs (per `spec.md` §4.10, a module never aborts the pass).
pub fn evaluate(
    template_id: &str,
    inputs: &FxHashMap<String, ParamValue>,
    ctx: &Context,
    periods: usize,
    options: &EvalOptions,
) -> Vec<Vec<f64>> {
    match template_id {
        "depreciation" => depreciation::evaluate(inputs, ctx, periods),
        "reserve" => reserve::evaluate(inputs, ctx, periods),
        "gst" => gst::evaluate(inputs, ctx, periods),
        "tax_losses" => tax_losses::evaluate(inputs, ctx, periods),
        "construction_funding" => construction_funding::evaluate(inputs, ctx, periods),
        "debt_sizing" => debt_sizing::evaluate(inputs, ctx, periods, options),
        _ => vec![vec![0.0; periods]; output_names(template_id).len()],
    }
}
