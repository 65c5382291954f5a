//! Construction-period funding waterfall (`spec.md` §4.9.5).
//!
//! Debt draws pro-rata against cumulative construction cost, capped by the
//! gearing cap and by `D_sized` (the sizing module's §4.9.6 output).
//! Interest-during-construction accrues monthly on the prior closing debt
//! balance and is funded entirely from equity, never drawn as debt.

use rustc_hash::FxHashMap;

use super::{resolve_scalar, resolve_vector};
use crate::context::Context;
use crate::model::ParamValue;

/// Outputs, in declared order: `{total_uses_ex_idc, senior_debt,
/// debt_drawdown, gearing_pct, idc, cumulative_idc, total_uses_incl_idc,
/// equity, equity_drawdown}`.
pub fn evaluate(inputs: &FxHashMap<String, ParamValue>, ctx: &Context, periods: usize) -> Vec<Vec<f64>> {
    let cost = resolve_vector(inputs.get("constructionCost"), ctx, periods);
    let gearing_cap_pct = resolve_scalar(inputs.get("maxGearingPct"), ctx);
    let sized_debt = resolve_scalar(inputs.get("sizedDebt"), ctx);
    let annual_rate_pct = resolve_scalar(inputs.get("interestRatePct"), ctx);
    let monthly_rate = annual_rate_pct / 100.0 / 12.0;

    let gearing_cap = gearing_cap_pct / 100.0;

    let mut total_uses_ex_idc = vec![0.0; periods];
    let mut senior_debt = vec![0.0; periods];
    let mut debt_drawdown = vec![0.0; periods];
    let mut gearing_pct = vec![0.0; periods];
    let mut idc = vec![0.0; periods];
    let mut cumulative_idc = vec![0.0; periods];
    let mut total_uses_incl_idc = vec![0.0; periods];
    let mut equity = vec![0.0; periods];
    let mut equity_drawdown = vec![0.0; periods];

    let mut cum_cost = 0.0;
    let mut cum_idc = 0.0;
    let mut debt_balance = 0.0;

    for i in 0..periods {
        cum_cost += cost[i];
        total_uses_ex_idc[i] = cum_cost;

        let idc_accrual = debt_balance * monthly_rate;
        idc[i] = idc_accrual;
        cum_idc += idc_accrual;
        cumulative_idc[i] = cum_idc;

        total_uses_incl_idc[i] = cum_cost + cum_idc;

        let debt_cap = (total_uses_incl_idc[i] * gearing_cap).min(sized_debt);
        let draw = (debt_cap - debt_balance).max(0.0);
        debt_drawdown[i] = draw;
        debt_balance += draw;
        senior_debt[i] = debt_balance;

        gearing_pct[i] = if total_uses_incl_idc[i] > 0.0 {
            debt_balance / total_uses_incl_idc[i] * 100.0
        } else {
            0.0
        };

        equity_drawdown[i] = (cost[i] - draw) + idc_accrual;
        equity[i] = total_uses_incl_idc[i] - debt_balance;
    }

    vec![
        total_uses_ex_idc,
        senior_debt,
        debt_drawdown,
        gearing_pct,
        idc,
        cumulative_idc,
        total_uses_incl_idc,
        equity,
        equity_drawdown,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debt_draws_respect_gearing_cap_and_idc_is_equity_funded() {
        let periods = 6;
        let cost = vec![100.0, 100.0, 100.0, 100.0, 100.0, 0.0];

        let mut ctx: Context = FxHashMap::default();
        ctx.insert("COST".into(), cost);

        let mut inputs = FxHashMap::default();
        inputs.insert("constructionCost".to_string(), ParamValue::Ref("COST".into()));
        inputs.insert("maxGearingPct".to_string(), ParamValue::Number(70.0));
        inputs.insert("sizedDebt".to_string(), ParamValue::Number(1000.0));
        inputs.insert("interestRatePct".to_string(), ParamValue::Number(6.0));

        let out = evaluate(&inputs, &ctx, periods);
        let (total_uses_ex_idc, senior_debt, gearing_pct, equity) = (&out[0], &out[1], &out[3], &out[7]);

        assert_eq!(total_uses_ex_idc[4], 500.0);
        for i in 0..5 {
            assert!(gearing_pct[i] <= 70.0 + 1e-6);
            assert!(senior_debt[i] <= 1000.0 + 1e-9);
            assert!(equity[i] >= -1e-9);
        }
        // no cost after period 4: debt balance stops growing, equity still
        // carries that period's IDC.
        assert!((senior_debt[5] - senior_debt[4]).abs() < 1e-9);
    }
}
