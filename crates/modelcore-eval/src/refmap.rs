//! Reference map builder (`spec.md` §4.3).
//!
//! Materialises every non-formula reference named in `spec.md` §3.3 into a
//! `periods`-long vector: input-group series (`V`, `S`, `C`, `L`), key-period
//! flags (`F`), indexation curves (`I`), and the fixed time constants (`T.*`).
//! The result seeds the mutable evaluation `Context` (`crate::context`); every
//! entry here is written once, before any calculation or module evaluates.

use rustc_hash::FxHashMap;

use modelcore_common::reference::{RefPrefix, Reference};

use crate::context::Context;
use crate::model::{Compounding, EntryMode, Freq, IndexDef, InputGroup, KeyPeriod, ModelInputs};
use crate::timeline::{Timeline, days_in_month};

/// Build the canonical key string for a reference (`spec.md` §6.3), so this
/// builder and `engine::graph`/`interpreter` share one definition of what a
/// reference looks like instead of each re-deriving the format.
fn ref_key(prefix: RefPrefix, id: u32, subscripts: &[&str]) -> String {
    Reference::Tagged {
        prefix,
        id,
        subscripts: subscripts.iter().map(|s| s.to_string()).collect(),
    }
    .to_string()
}

/// Build the full reference map for a model's non-formula inputs.
pub fn build_reference_map(inputs: &ModelInputs, timeline: &Timeline) -> Context {
    let mut ctx = Context::new();
    build_time_constants(timeline, &mut ctx);
    build_flags(&inputs.key_periods, timeline, &mut ctx);
    build_indexation(&inputs.indices, timeline, &mut ctx);
    build_input_groups(inputs, timeline, &mut ctx);
    ctx
}

fn quarter_of(month: u32) -> u32 {
    (month - 1) / 3
}

fn build_time_constants(timeline: &Timeline, ctx: &mut Context) {
    let n = timeline.periods as usize;
    ctx.insert("T.MiY".into(), vec![12.0; n]);
    ctx.insert("T.QiY".into(), vec![4.0; n]);
    ctx.insert("T.HiD".into(), vec![24.0; n]);
    ctx.insert("T.MiQ".into(), vec![3.0; n]);

    let mut d_im = Vec::with_capacity(n);
    let mut d_iy = Vec::with_capacity(n);
    let mut d_iq = Vec::with_capacity(n);
    let mut h_im = Vec::with_capacity(n);
    let mut h_iy = Vec::with_capacity(n);
    let mut qe = Vec::with_capacity(n);
    let mut cye = Vec::with_capacity(n);
    let mut fye = Vec::with_capacity(n);

    for i in 0..n {
        let y = timeline.year[i];
        let m = timeline.month[i];
        let dim = days_in_month(y, m) as f64;
        let diy = if crate::timeline::is_leap_year(y) {
            366.0
        } else {
            365.0
        };
        let q = quarter_of(m);
        let diq: f64 = (0..3)
            .map(|k| days_in_month(y, q * 3 + 1 + k) as f64)
            .sum();

        d_im.push(dim);
        d_iy.push(diy);
        d_iq.push(diq);
        h_im.push(dim * 24.0);
        h_iy.push(diy * 24.0);
        qe.push(if matches!(m, 3 | 6 | 9 | 12) { 1.0 } else { 0.0 });
        cye.push(if m == 12 { 1.0 } else { 0.0 });
        fye.push(if m == 6 { 1.0 } else { 0.0 });
    }

    ctx.insert("T.DiM".into(), d_im);
    ctx.insert("T.DiY".into(), d_iy);
    ctx.insert("T.DiQ".into(), d_iq);
    ctx.insert("T.HiM".into(), h_im);
    ctx.insert("T.HiY".into(), h_iy);
    ctx.insert("T.QE".into(), qe);
    ctx.insert("T.CYE".into(), cye);
    ctx.insert("T.FYE".into(), fye);
}

fn build_flags(key_periods: &[KeyPeriod], timeline: &Timeline, ctx: &mut Context) {
    let n = timeline.periods as usize;
    for kp in key_periods {
        let lo = Timeline::months_key(kp.start_year, kp.start_month);
        let hi = Timeline::months_key(kp.end_year, kp.end_month);
        let mut flag = vec![0.0; n];
        let mut first = None;
        let mut last = None;
        for i in 0..n {
            let key = Timeline::months_key(timeline.year[i], timeline.month[i]);
            if key >= lo && key <= hi {
                flag[i] = 1.0;
                first.get_or_insert(i);
                last = Some(i);
            }
        }
        let mut start_v = vec![0.0; n];
        let mut end_v = vec![0.0; n];
        if let Some(f) = first {
            start_v[f] = 1.0;
        }
        if let Some(l) = last {
            end_v[l] = 1.0;
        }
        ctx.insert(ref_key(RefPrefix::Flag, kp.id, &[]), flag);
        ctx.insert(ref_key(RefPrefix::Flag, kp.id, &["Start"]), start_v);
        ctx.insert(ref_key(RefPrefix::Flag, kp.id, &["End"]), end_v);
    }
}

fn build_indexation(indices: &[IndexDef], timeline: &Timeline, ctx: &mut Context) {
    let n = timeline.periods as usize;
    for idx in indices {
        let mut out = vec![0.0; n];
        let base_key = idx.base_year as i64 * 12 + idx.base_month as i64;
        match idx.compounding {
            Compounding::Annual => {
                for i in 0..n {
                    let cur_key = timeline.year[i] as i64 * 12 + timeline.month[i] as i64;
                    let months_from_base = cur_key - base_key;
                    let years = (months_from_base as f64 / 12.0).floor().max(0.0);
                    out[i] = (1.0 + idx.rate / 100.0).powf(years);
                }
            }
            Compounding::Monthly => {
                let monthly = (1.0 + idx.rate / 100.0).powf(1.0 / 12.0) - 1.0;
                for i in 0..n {
                    let cur_key = timeline.year[i] as i64 * 12 + timeline.month[i] as i64;
                    let months_from_base = (cur_key - base_key).max(0) as f64;
                    out[i] = (1.0 + monthly).powf(months_from_base);
                }
            }
        }
        ctx.insert(ref_key(RefPrefix::Indexation, idx.id, &[]), out);
    }
}

/// One of `V`, `S`, `C`, `L` — the mode-prefix family assigned per
/// `spec.md` §4.3's "assign a mode prefix and a sequential index".
fn prefix_for(mode: EntryMode) -> RefPrefix {
    match mode {
        EntryMode::Values => RefPrefix::Values,
        EntryMode::Series => RefPrefix::Series,
        EntryMode::Constant => RefPrefix::Constants,
        EntryMode::Lookup | EntryMode::Lookup2 => RefPrefix::Lookup,
    }
}

fn build_input_groups(inputs: &ModelInputs, timeline: &Timeline, ctx: &mut Context) {
    // Sequential index within each prefix family, in declaration order,
    // skipping groups with no inputs.
    let mut next_idx: FxHashMap<RefPrefix, u32> = FxHashMap::default();
    let mut group_idx: FxHashMap<u32, u32> = FxHashMap::default();

    let inputs_by_group: FxHashMap<u32, Vec<&crate::model::Input>> = {
        let mut m: FxHashMap<u32, Vec<&crate::model::Input>> = FxHashMap::default();
        for inp in &inputs.inputs {
            m.entry(inp.group_id).or_default().push(inp);
        }
        m
    };

    for group in &inputs.input_groups {
        let members = inputs_by_group.get(&group.id);
        if members.map(|v| v.is_empty()).unwrap_or(true) {
            continue;
        }
        let prefix = prefix_for(group.entry_mode);
        let idx = *next_idx
            .entry(prefix)
            .and_modify(|v| *v += 1)
            .or_insert(1);
        group_idx.insert(group.id, idx);
    }

    for group in &inputs.input_groups {
        let Some(&idx) = group_idx.get(&group.id) else {
            continue;
        };
        let prefix = prefix_for(group.entry_mode);
        let members = &inputs_by_group[&group.id];

        let (eff_start_year, eff_start_month, group_periods) =
            effective_window(group, &inputs.key_periods, timeline);

        let mut subtotal = vec![0.0; timeline.periods as usize];
        for (member_idx, input) in members.iter().enumerate() {
            let arr = build_input_array(
                input,
                group,
                eff_start_year,
                eff_start_month,
                group_periods,
                timeline,
            );
            let sub = input
                .subgroup_id
                .clone()
                .unwrap_or_else(|| (member_idx + 1).to_string());
            for (i, v) in arr.iter().enumerate() {
                subtotal[i] += v;
            }
            ctx.insert(ref_key(prefix, idx, &[&sub]), arr);
        }
        ctx.insert(ref_key(prefix, idx, &[]), subtotal);
    }
}

fn effective_window(
    group: &InputGroup,
    key_periods: &[KeyPeriod],
    timeline: &Timeline,
) -> (i32, u32, u32) {
    if let Some(kp_id) = group.linked_key_period_id {
        if let Some(kp) = key_periods.iter().find(|k| k.id == kp_id) {
            let periods = (kp.end_year - kp.start_year) * 12
                + kp.end_month as i32
                - kp.start_month as i32
                + 1;
            return (kp.start_year, kp.start_month, periods.max(0) as u32);
        }
    }
    if let Some(periods) = group.periods {
        return (group.start_year, group.start_month, periods);
    }
    if let (Some(ey), Some(em)) = (group.end_year, group.end_month) {
        let periods = (ey - group.start_year) * 12 + em as i32 - group.start_month as i32 + 1;
        return (group.start_year, group.start_month, periods.max(0) as u32);
    }
    // Fall back to "runs to the end of the timeline".
    let start_idx = timeline
        .index_of(group.start_year, group.start_month)
        .unwrap_or(0);
    (
        group.start_year,
        group.start_month,
        (timeline.periods as usize - start_idx) as u32,
    )
}

fn build_input_array(
    input: &crate::model::Input,
    group: &InputGroup,
    eff_start_year: i32,
    eff_start_month: u32,
    group_periods: u32,
    timeline: &Timeline,
) -> Vec<f64> {
    let mut monthly = vec![0.0; group_periods as usize];

    match group.entry_mode {
        EntryMode::Constant => {
            let v = input.value.unwrap_or(0.0);
            for slot in monthly.iter_mut() {
                *slot = v;
            }
        }
        EntryMode::Series => {
            if let Some(values) = &input.values {
                for (k, v) in values {
                    if (*k as usize) < monthly.len() {
                        monthly[*k as usize] = *v;
                    }
                }
            } else if let Some(v) = input.value {
                let freq = input.series_frequency.unwrap_or(Freq::M);
                let per_month = match freq {
                    Freq::Y | Freq::FY => v / 12.0,
                    Freq::Q => v / 3.0,
                    Freq::M => v,
                };
                for slot in monthly.iter_mut() {
                    *slot = per_month;
                }
            }
        }
        EntryMode::Values | EntryMode::Lookup | EntryMode::Lookup2 => {
            if let Some(values) = &input.values {
                for (k, v) in values {
                    if (*k as usize) < monthly.len() {
                        monthly[*k as usize] = *v;
                    }
                }
            } else if let Some(v) = input.value {
                for slot in monthly.iter_mut() {
                    *slot = v;
                }
            }
        }
    }

    let mut out = vec![0.0; timeline.periods as usize];
    let mut y = eff_start_year;
    let mut m = eff_start_month;
    let mut last_written: Option<usize> = None;
    for slot in &monthly {
        if let Some(ti) = timeline.index_of(y, m) {
            out[ti] = *slot;
            if *slot != 0.0 {
                last_written = Some(ti);
            }
        }
        m += 1;
        if m > 12 {
            m = 1;
            y += 1;
        }
    }

    if matches!(group.entry_mode, EntryMode::Lookup | EntryMode::Lookup2) {
        if let Some(mut last) = last_written {
            let fill = out[last];
            for v in out.iter_mut().skip(last + 1) {
                *v = fill;
            }
            let _ = &mut last;
        }
    }

    out
}
