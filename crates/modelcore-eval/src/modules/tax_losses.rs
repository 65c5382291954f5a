//! Carried-forward tax losses (`spec.md` §4.9.4, scenario S3).
//!
//! The `min` of two independently cumulative sums — utilised losses can
//! never exceed either what was generated or what could be offset — avoids
//! any lag dependence between the two tracks.

use rustc_hash::FxHashMap;

use super::{resolve_scalar, resolve_vector};
use crate::context::Context;
use crate::model::ParamValue;

fn running_sum(x: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    x.iter().map(|v| { acc += v; acc }).collect()
}

/// Outputs, in declared order: `{generated, utilised, closing, net_taxable, tax}`.
pub fn evaluate(inputs: &FxHashMap<String, ParamValue>, ctx: &Context, periods: usize) -> Vec<Vec<f64>> {
    let income = resolve_vector(inputs.get("income"), ctx, periods);
    let ops_flag = match inputs.get("opsFlag") {
        Some(v) => resolve_vector(Some(v), ctx, periods),
        None => vec![1.0; periods],
    };
    let rate = resolve_scalar(inputs.get("rate"), ctx);

    let generated: Vec<f64> = (0..periods).map(|i| (-income[i]).max(0.0) * ops_flag[i]).collect();
    let potential: Vec<f64> = (0..periods).map(|i| income[i].max(0.0) * ops_flag[i]).collect();

    let cum_generated = running_sum(&generated);
    let cum_potential = running_sum(&potential);

    let cum_utilised: Vec<f64> = (0..periods).map(|i| cum_generated[i].min(cum_potential[i])).collect();
    let mut utilised = vec![0.0; periods];
    let mut closing = vec![0.0; periods];
    let mut net_taxable = vec![0.0; periods];
    let mut tax = vec![0.0; periods];

    for i in 0..periods {
        utilised[i] = cum_utilised[i] - if i > 0 { cum_utilised[i - 1] } else { 0.0 };
        closing[i] = cum_generated[i] - cum_utilised[i];
        net_taxable[i] = (income[i] - utilised[i]).max(0.0);
        tax[i] = net_taxable[i] * rate;
    }

    vec![generated, utilised, closing, net_taxable, tax]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `spec.md` §8 scenario S3.
    #[test]
    fn matches_s3() {
        let periods = 5;
        let income = vec![-100.0, -50.0, 30.0, 200.0, 50.0];
        let ops_flag = vec![1.0; periods];

        let mut ctx: Context = FxHashMap::default();
        ctx.insert("INCOME".into(), income);
        ctx.insert("OPS".into(), ops_flag);

        let mut inputs = FxHashMap::default();
        inputs.insert("income".to_string(), ParamValue::Ref("INCOME".into()));
        inputs.insert("opsFlag".to_string(), ParamValue::Ref("OPS".into()));
        inputs.insert("rate".to_string(), ParamValue::Number(0.30));

        let out = evaluate(&inputs, &ctx, periods);
        let (generated, utilised, closing, net_taxable, tax) =
            (&out[0], &out[1], &out[2], &out[3], &out[4]);

        assert_eq!(generated, &[100.0, 50.0, 0.0, 0.0, 0.0]);
        assert_eq!(utilised, &[0.0, 0.0, 30.0, 120.0, 0.0]);
        assert_eq!(closing, &[100.0, 150.0, 120.0, 0.0, 0.0]);
        assert_eq!(net_taxable, &[0.0, 0.0, 0.0, 80.0, 50.0]);
        for (t, expected) in tax.iter().zip([0.0, 0.0, 0.0, 24.0, 15.0]) {
            assert!((t - expected).abs() < 1e-9);
        }
    }
}
