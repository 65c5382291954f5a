//! GST receivable ledger (`spec.md` §4.9.3).

use rustc_hash::FxHashMap;

use super::{resolve_scalar, resolve_vector};
use crate::context::Context;
use crate::model::ParamValue;

/// Outputs, in declared order: `{gst_amount, gst_paid, gst_received, receivable_closing}`.
pub fn evaluate(inputs: &FxHashMap<String, ParamValue>, ctx: &Context, periods: usize) -> Vec<Vec<f64>> {
    let base = resolve_vector(inputs.get("base"), ctx, periods);
    let active = match inputs.get("activeFlag") {
        Some(v) => resolve_vector(Some(v), ctx, periods),
        None => vec![1.0; periods],
    };
    let rate = resolve_scalar(inputs.get("rate"), ctx);
    let delay = resolve_scalar(inputs.get("delayPeriods"), ctx).round().max(0.0) as usize;

    let mut gst_amount = vec![0.0; periods];
    let mut gst_paid = vec![0.0; periods];
    for i in 0..periods {
        gst_amount[i] = base[i] * rate * active[i];
        gst_paid[i] = -gst_amount[i];
    }

    let mut cum_paid = vec![0.0; periods];
    let mut acc = 0.0;
    for i in 0..periods {
        acc += gst_paid[i];
        cum_paid[i] = acc;
    }

    let cum_received: Vec<f64> = (0..periods)
        .map(|i| if i >= delay { cum_paid[i - delay] } else { 0.0 })
        .collect();

    let mut receivable_closing = vec![0.0; periods];
    let mut gst_received = vec![0.0; periods];
    for i in 0..periods {
        receivable_closing[i] = cum_paid[i] - cum_received[i];
        gst_received[i] = if i > 0 {
            cum_received[i] - cum_received[i - 1]
        } else {
            cum_received[i]
        };
    }

    vec![gst_amount, gst_paid, gst_received, receivable_closing]
}
