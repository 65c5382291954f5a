//! Reserve account (`spec.md` §4.9.2, scenario S4).
//!
//! Drawdown is capped by the balance available *before* it is taken, and
//! release drains whatever remains, so the three cumulative quantities are
//! built with a single sequential forward pass rather than independent
//! cumulative sums.

use rustc_hash::FxHashMap;

use super::{resolve_scalar, resolve_vector};
use crate::context::Context;
use crate::model::ParamValue;

/// Outputs, in declared order: `{opening, funding, drawdown, release, closing}`.
pub fn evaluate(inputs: &FxHashMap<String, ParamValue>, ctx: &Context, periods: usize) -> Vec<Vec<f64>> {
    let funding_amount = resolve_vector(inputs.get("fundingAmount"), ctx, periods);
    let funding_flag = resolve_vector(inputs.get("fundingFlag"), ctx, periods);
    let drawdown_amount = resolve_vector(inputs.get("drawdownAmount"), ctx, periods);
    let drawdown_flag = resolve_vector(inputs.get("drawdownFlag"), ctx, periods);
    let release_flag = resolve_vector(inputs.get("releaseFlag"), ctx, periods);
    let _tolerance = resolve_scalar(inputs.get("tolerance"), ctx);

    let mut opening = vec![0.0; periods];
    let mut funding = vec![0.0; periods];
    let mut drawdown = vec![0.0; periods];
    let mut release = vec![0.0; periods];
    let mut closing = vec![0.0; periods];

    let mut cum_funding = 0.0;
    let mut cum_drawdown = 0.0;
    let mut cum_release = 0.0;

    for i in 0..periods {
        opening[i] = cum_funding - cum_drawdown - cum_release;

        funding[i] = funding_amount[i] * funding_flag[i];
        cum_funding += funding[i];

        let available = cum_funding - cum_drawdown - cum_release;
        let requested = drawdown_amount[i] * drawdown_flag[i];
        drawdown[i] = requested.min(available).max(0.0);
        cum_drawdown += drawdown[i];

        let available_after_drawdown = cum_funding - cum_drawdown - cum_release;
        release[i] = if release_flag[i] != 0.0 {
            available_after_drawdown.max(0.0)
        } else {
            0.0
        };
        cum_release += release[i];

        closing[i] = cum_funding - cum_drawdown - cum_release;
    }

    vec![opening, funding, drawdown, release, closing]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `spec.md` §8 scenario S4.
    #[test]
    fn drawdown_capped_and_balance_tracks_s4() {
        let periods = 6;
        let mut funding_amount = vec![0.0; periods];
        funding_amount[0] = 50.0;
        funding_amount[1] = 50.0;
        let funding_flag = vec![1.0; periods];
        let mut drawdown_amount = vec![0.0; periods];
        drawdown_amount[2] = 30.0;
        let mut drawdown_flag = vec![0.0; periods];
        drawdown_flag[2] = 1.0;
        let release_flag = vec![0.0; periods];

        let mut ctx: Context = FxHashMap::default();
        ctx.insert("FA".into(), funding_amount);
        ctx.insert("FF".into(), funding_flag);
        ctx.insert("DA".into(), drawdown_amount);
        ctx.insert("DF".into(), drawdown_flag);
        ctx.insert("RF".into(), release_flag);

        let mut inputs = FxHashMap::default();
        inputs.insert("fundingAmount".to_string(), ParamValue::Ref("FA".into()));
        inputs.insert("fundingFlag".to_string(), ParamValue::Ref("FF".into()));
        inputs.insert("drawdownAmount".to_string(), ParamValue::Ref("DA".into()));
        inputs.insert("drawdownFlag".to_string(), ParamValue::Ref("DF".into()));
        inputs.insert("releaseFlag".to_string(), ParamValue::Ref("RF".into()));

        let out = evaluate(&inputs, &ctx, periods);
        let closing = &out[4];
        assert_eq!(&closing[0..4], &[50.0, 100.0, 70.0, 70.0]);
    }
}
