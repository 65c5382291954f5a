//! Depreciation / amortisation, straight-line and declining-balance
//! (`spec.md` §4.9.1, scenario S1).

use rustc_hash::FxHashMap;

use super::{first_index_where, resolve_scalar, resolve_vector};
use crate::context::Context;
use crate::model::ParamValue;

fn running_sum(x: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    x.iter().map(|v| { acc += v; acc }).collect()
}

/// Outputs, in declared order: `{opening, addition, depreciation, accumulated, closing}`.
pub fn evaluate(inputs: &FxHashMap<String, ParamValue>, ctx: &Context, periods: usize) -> Vec<Vec<f64>> {
    let a = resolve_vector(inputs.get("additions"), ctx, periods);
    let f = resolve_vector(inputs.get("opsFlag"), ctx, periods);
    let life_years = resolve_scalar(inputs.get("usefulLifeYears"), ctx).max(1e-9);
    let method = match inputs.get("method") {
        Some(ParamValue::Ref(s)) => s.clone(),
        _ => "sl".to_string(),
    };
    let db_multiplier = resolve_scalar(inputs.get("dbMultiplier"), ctx);

    let cum_a = running_sum(&a);
    let n_ops = running_sum(&f);
    let i0 = first_index_where(&f, |v| v != 0.0);

    let capital = i0.map(|idx| cum_a[idx]).unwrap_or(0.0);

    let mut opening = vec![0.0; periods];
    let mut addition = vec![0.0; periods];
    let mut depreciation = vec![0.0; periods];
    let mut accumulated = vec![0.0; periods];
    let mut closing = vec![0.0; periods];

    let Some(i0) = i0 else {
        return vec![opening, addition, depreciation, accumulated, closing];
    };
    addition[i0] = capital;

    if method.eq_ignore_ascii_case("db") {
        let r = db_multiplier / life_years / 12.0;
        for i in 0..periods {
            closing[i] = capital * (1.0 - r).powf(n_ops[i]);
        }
        for i in 0..periods {
            opening[i] = if i > 0 { closing[i - 1] } else { 0.0 };
            depreciation[i] = (opening[i] + addition[i] - closing[i]).max(0.0);
        }
    } else {
        let rate = capital / life_years / 12.0;
        for i in 0..periods {
            closing[i] = (capital - rate * n_ops[i]).max(0.0);
            let gated_capital = if i > i0 { capital } else { 0.0 };
            opening[i] = (gated_capital - rate * (n_ops[i] - f[i])).max(0.0);
            depreciation[i] = (opening[i] + addition[i]).min(rate) * f[i];
        }
    }

    let mut acc = 0.0;
    for i in 0..periods {
        acc += depreciation[i];
        accumulated[i] = acc;
    }

    vec![opening, addition, depreciation, accumulated, closing]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `spec.md` §8 scenario S1.
    #[test]
    fn straight_line_matches_s1() {
        let periods = 24;
        let mut additions = vec![0.0; periods];
        additions[2] = 1000.0; // Mar 2024
        let mut ops = vec![0.0; periods];
        for v in ops.iter_mut().skip(4) {
            *v = 1.0; // May 2024 onward
        }

        let mut ctx: Context = FxHashMap::default();
        ctx.insert("A".into(), additions);
        ctx.insert("F".into(), ops);

        let mut inputs = FxHashMap::default();
        inputs.insert("additions".to_string(), ParamValue::Ref("A".into()));
        inputs.insert("opsFlag".to_string(), ParamValue::Ref("F".into()));
        inputs.insert("usefulLifeYears".to_string(), ParamValue::Number(10.0));

        let out = evaluate(&inputs, &ctx, periods);
        let (opening, addition, depreciation, _accumulated, closing) =
            (&out[0], &out[1], &out[2], &out[3], &out[4]);

        assert_eq!(addition[4], 1000.0);
        let monthly_rate = 1000.0 / 10.0 / 12.0;
        assert!((depreciation[4] - monthly_rate).abs() < 1e-6);
        assert!((depreciation[23] - monthly_rate).abs() < 1e-6);
        assert!((closing[4] - (1000.0 - monthly_rate)).abs() < 1e-3);
        assert!((closing[23] - (1000.0 - monthly_rate * 20.0)).abs() < 1e-3);
        assert_eq!(opening[3], 0.0);
    }
}
