//! Formula DSL evaluator (`spec.md` §4.2, §4.7).
//!
//! Non-cluster evaluation follows the "materialise array built-ins once,
//! substitute placeholders, evaluate the scalar remainder per period" model
//! from §4.2 and §9 ("prefer tagged variants for formula nodes ... a
//! pre-parsed IR"). Array built-ins are lowered as an AST rewrite rather than
//! a text rewrite: each `Call` node for an array function is replaced by a
//! `Ref` into a small per-formula placeholder table built alongside the main
//! context. `crate::engine::cluster_eval` reuses [`eval_at`] and
//! [`scalar_builtin`] directly for the period-by-period cluster path, where
//! array built-ins instead carry accumulator state across periods.

use rustc_hash::FxHashMap;

use modelcore_parse::{BinOp, Expr, UnOp};

use crate::context::Context;
use crate::timeline::Timeline;

/// Function names materialised eagerly, over the whole array, before the
/// scalar remainder is evaluated per period (`spec.md` §4.2).
const ARRAY_FNS: &[&str] = &[
    "CUMSUM", "CUMPROD", "CUMSUM_Y", "CUMPROD_Y", "SHIFT", "PREVSUM", "PREVVAL", "COUNT",
    "MAXVAL", "FWDSUM",
];

fn is_array_fn(name: &str) -> bool {
    ARRAY_FNS.contains(&name)
}

/// Collapse non-finite results to 0 (`spec.md` §3.1, §4.2).
fn finite(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

fn lookup(name: &str, i: usize, ctx: &Context, locals: &Context) -> f64 {
    let v = locals.get(name).or_else(|| ctx.get(name));
    match v {
        Some(vec) => vec.get(i).copied().unwrap_or(0.0),
        None => 0.0,
    }
}

/// Evaluate `expr` (already lowered — no array-function `Call` nodes remain)
/// at a single period index, resolving every `Ref` through `resolve`. Shared
/// by the non-cluster path ([`eval_at`]) and `engine::cluster_eval`, which
/// substitutes per-period placeholder scalars instead of context vectors.
pub fn eval_with_resolver(expr: &Expr, i: usize, resolve: &impl Fn(&str, usize) -> f64) -> f64 {
    match expr {
        Expr::Number(n) => finite(n.0),
        Expr::Ref(name) => resolve(name, i),
        Expr::Unary { op, expr } => {
            let v = eval_with_resolver(expr, i, resolve);
            finite(match op {
                UnOp::Neg => -v,
                UnOp::Pos => v,
            })
        }
        Expr::Binary { op, left, right } => {
            let a = eval_with_resolver(left, i, resolve);
            let b = eval_with_resolver(right, i, resolve);
            finite(apply_binop(*op, a, b))
        }
        Expr::Call { name, args } => {
            let argv: Vec<f64> = args.iter().map(|a| eval_with_resolver(a, i, resolve)).collect();
            finite(scalar_builtin(name, &argv))
        }
    }
}

/// Evaluate `expr` (already lowered — no array-function `Call` nodes remain
/// for the non-cluster path) at a single period index.
pub fn eval_at(expr: &Expr, i: usize, ctx: &Context, locals: &Context) -> f64 {
    eval_with_resolver(expr, i, &|name, j| lookup(name, j, ctx, locals))
}

fn apply_binop(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
        BinOp::Pow => a.powf(b),
        BinOp::Mod => {
            if b == 0.0 {
                0.0
            } else {
                a % b
            }
        }
        BinOp::Gt => (a > b) as i32 as f64,
        BinOp::Lt => (a < b) as i32 as f64,
        BinOp::Ge => (a >= b) as i32 as f64,
        BinOp::Le => (a <= b) as i32 as f64,
        BinOp::Eq => (a == b) as i32 as f64,
        BinOp::Ne => (a != b) as i32 as f64,
        BinOp::And => ((a != 0.0) && (b != 0.0)) as i32 as f64,
        BinOp::Or => ((a != 0.0) || (b != 0.0)) as i32 as f64,
    }
}

/// `spec.md` §4.2 scalar built-ins. `name` arrives upper-cased from the parser.
fn scalar_builtin(name: &str, argv: &[f64]) -> f64 {
    match name {
        "MIN" => argv.first().copied().unwrap_or(0.0).min(argv.get(1).copied().unwrap_or(0.0)),
        "MAX" => argv.first().copied().unwrap_or(0.0).max(argv.get(1).copied().unwrap_or(0.0)),
        "ABS" => argv.first().copied().unwrap_or(0.0).abs(),
        "ROUND" => {
            let x = argv.first().copied().unwrap_or(0.0);
            let n = argv.get(1).copied().unwrap_or(0.0) as i32;
            let factor = 10f64.powi(n);
            (x * factor).round() / factor
        }
        "IF" => {
            let cond = argv.first().copied().unwrap_or(0.0);
            if cond != 0.0 {
                argv.get(1).copied().unwrap_or(0.0)
            } else {
                argv.get(2).copied().unwrap_or(0.0)
            }
        }
        "AND" => {
            let a = argv.first().copied().unwrap_or(0.0);
            let b = argv.get(1).copied().unwrap_or(0.0);
            ((a != 0.0) && (b != 0.0)) as i32 as f64
        }
        "OR" => {
            let a = argv.first().copied().unwrap_or(0.0);
            let b = argv.get(1).copied().unwrap_or(0.0);
            ((a != 0.0) || (b != 0.0)) as i32 as f64
        }
        "NOT" => (argv.first().copied().unwrap_or(0.0) == 0.0) as i32 as f64,
        _ => 0.0,
    }
}

fn eval_vector(expr: &Expr, periods: usize, ctx: &Context, locals: &Context) -> Vec<f64> {
    (0..periods).map(|i| eval_at(expr, i, ctx, locals)).collect()
}

/// Resolve a `FWDSUM` window argument (`spec.md` §4.2, §9 open question 2):
/// a literal rounds directly; a reference resolves to its first non-zero
/// value, or `6` if none exists.
fn resolve_window(w: &Expr, periods: usize, ctx: &Context, locals: &Context) -> usize {
    if let Expr::Number(n) = w {
        return n.0.round().max(0.0) as usize;
    }
    let v = eval_vector(w, periods, ctx, locals);
    let first_nonzero = v.iter().copied().find(|x| *x != 0.0);
    first_nonzero.unwrap_or(6.0).round().max(0.0) as usize
}

/// Lower every array-function `Call` in `expr` into a `Ref` to a freshly
/// materialised placeholder vector stored in `locals`. Returns the rewritten
/// expression; `expr` itself is left untouched.
pub fn lower_arrays(
    expr: &Expr,
    periods: usize,
    timeline: &Timeline,
    ctx: &Context,
    locals: &mut Context,
    counter: &mut u32,
) -> Expr {
    match expr {
        Expr::Number(_) | Expr::Ref(_) => expr.clone(),
        Expr::Unary { op, expr: inner } => Expr::Unary {
            op: *op,
            expr: Box::new(lower_arrays(inner, periods, timeline, ctx, locals, counter)),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(lower_arrays(left, periods, timeline, ctx, locals, counter)),
            right: Box::new(lower_arrays(right, periods, timeline, ctx, locals, counter)),
        },
        Expr::Call { name, args } => {
            if is_array_fn(name) {
                // Lower nested array calls inside the arguments first.
                let lowered_args: Vec<Expr> = args
                    .iter()
                    .map(|a| lower_arrays(a, periods, timeline, ctx, locals, counter))
                    .collect();
                let out = materialize_array_fn(name, &lowered_args, periods, timeline, ctx, locals);
                *counter += 1;
                let placeholder = format!("__arr{}", *counter);
                locals.insert(placeholder.clone(), out);
                Expr::Ref(placeholder)
            } else {
                Expr::Call {
                    name: name.clone(),
                    args: args
                        .iter()
                        .map(|a| lower_arrays(a, periods, timeline, ctx, locals, counter))
                        .collect(),
                }
            }
        }
    }
}

/// A missing argument (malformed call, e.g. `CUMSUM()`) zero-fills rather
/// than panicking — consistent with `spec.md` §4.10's "the pass always
/// completes".
fn arg_or_zero(args: &[Expr], i: usize) -> Expr {
    args.get(i).cloned().unwrap_or_else(|| Expr::number(0.0))
}

fn materialize_array_fn(
    name: &str,
    args: &[Expr],
    periods: usize,
    timeline: &Timeline,
    ctx: &Context,
    locals: &Context,
) -> Vec<f64> {
    let first = arg_or_zero(args, 0);
    match name {
        "CUMSUM" => {
            let x = eval_vector(&first, periods, ctx, locals);
            let mut acc = 0.0;
            x.iter().map(|v| { acc += v; acc }).collect()
        }
        "CUMPROD" => {
            let x = eval_vector(&first, periods, ctx, locals);
            let mut acc = 1.0;
            x.iter().map(|v| { acc *= v; acc }).collect()
        }
        "CUMSUM_Y" => cumulate_yearly(&eval_vector(&first, periods, ctx, locals), timeline, false),
        "CUMPROD_Y" => cumulate_yearly(&eval_vector(&first, periods, ctx, locals), timeline, true),
        "SHIFT" => {
            let x = eval_vector(&first, periods, ctx, locals);
            let n = resolve_window(&arg_or_zero(args, 1), periods, ctx, locals) as i64;
            (0..periods)
                .map(|i| {
                    let j = i as i64 - n;
                    if j >= 0 { x[j as usize] } else { 0.0 }
                })
                .collect()
        }
        "PREVSUM" => {
            let x = eval_vector(&first, periods, ctx, locals);
            let mut acc = 0.0;
            let mut out = Vec::with_capacity(periods);
            for v in &x {
                out.push(acc);
                acc += v;
            }
            out
        }
        "PREVVAL" => {
            let x = eval_vector(&first, periods, ctx, locals);
            (0..periods)
                .map(|i| if i > 0 { x[i - 1] } else { 0.0 })
                .collect()
        }
        "COUNT" => {
            let x = eval_vector(&first, periods, ctx, locals);
            let mut acc = 0.0;
            x.iter()
                .map(|v| {
                    if *v != 0.0 {
                        acc += 1.0;
                    }
                    acc
                })
                .collect()
        }
        "MAXVAL" => {
            let x = eval_vector(&first, periods, ctx, locals);
            let m = x.iter().copied().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
            let m = if m.is_finite() { m } else { 0.0 };
            vec![m; periods]
        }
        "FWDSUM" => {
            let x = eval_vector(&first, periods, ctx, locals);
            let w = resolve_window(&arg_or_zero(args, 1), periods, ctx, locals);
            (0..periods)
                .map(|i| {
                    let end = (i + w).min(periods);
                    x[i..end].iter().sum()
                })
                .collect()
        }
        _ => vec![0.0; periods],
    }
}

fn cumulate_yearly(x: &[f64], timeline: &Timeline, multiplicative: bool) -> Vec<f64> {
    let periods = x.len();
    let mut out = vec![0.0; periods];
    let mut acc = if multiplicative { 1.0 } else { 0.0 };
    let mut seen_transition = false;
    for i in 0..periods {
        let is_new_year = i > 0 && timeline.year[i] != timeline.year[i - 1];
        if is_new_year {
            let prev_year_last = x[i - 1];
            if multiplicative {
                acc *= prev_year_last;
            } else {
                acc += prev_year_last;
            }
            seen_transition = true;
        }
        out[i] = if seen_transition {
            acc
        } else if multiplicative {
            1.0
        } else {
            0.0
        };
    }
    out
}

/// Evaluate a whole formula over every period in the non-cluster model
/// (`spec.md` §4.7): materialise array built-ins once, then evaluate the
/// scalar remainder per period.
pub fn evaluate_non_cluster(expr: &Expr, periods: usize, timeline: &Timeline, ctx: &Context) -> Vec<f64> {
    let mut locals: Context = FxHashMap::default();
    let mut counter = 0u32;
    let lowered = lower_arrays(expr, periods, timeline, ctx, &mut locals, &mut counter);
    eval_vector(&lowered, periods, ctx, &locals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelcore_parse::parse;

    fn periods_timeline(n: usize) -> Timeline {
        Timeline {
            periods: n as u32,
            start_year: 2024,
            start_month: 1,
            end_year: 2024,
            end_month: n as u32,
            year: vec![2024; n],
            month: (1..=n as u32).collect(),
            label: (1..=n).map(|m| format!("2024-{m:02}")).collect(),
        }
    }

    #[test]
    fn cumsum_and_prevsum_relation() {
        let t = periods_timeline(5);
        let mut ctx: Context = FxHashMap::default();
        ctx.insert("X".into(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let cumsum = evaluate_non_cluster(&parse("CUMSUM(X)").unwrap(), 5, &t, &ctx);
        let prevsum = evaluate_non_cluster(&parse("PREVSUM(X)").unwrap(), 5, &t, &ctx);
        for i in 0..5 {
            assert!((cumsum[i] - ctx["X"][i] - prevsum[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn shift_one_equals_prevval() {
        let t = periods_timeline(5);
        let mut ctx: Context = FxHashMap::default();
        ctx.insert("X".into(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let shift = evaluate_non_cluster(&parse("SHIFT(X,1)").unwrap(), 5, &t, &ctx);
        let prevval = evaluate_non_cluster(&parse("PREVVAL(X)").unwrap(), 5, &t, &ctx);
        assert_eq!(shift, prevval);
        assert_eq!(shift[0], 0.0);
    }

    #[test]
    fn missing_ref_resolves_to_zero() {
        let t = periods_timeline(3);
        let ctx: Context = FxHashMap::default();
        let out = evaluate_non_cluster(&parse("MISSING_REF_LOOKING_THING + 1").unwrap(), 3, &t, &ctx);
        assert_eq!(out, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn division_by_zero_collapses_to_zero() {
        let t = periods_timeline(1);
        let ctx: Context = FxHashMap::default();
        let out = evaluate_non_cluster(&parse("5/0").unwrap(), 1, &t, &ctx);
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn nested_if_and_min_max() {
        let t = periods_timeline(1);
        let mut ctx: Context = FxHashMap::default();
        ctx.insert("R1".into(), vec![5.0]);
        let out = evaluate_non_cluster(
            &parse("IF(R1>0, MIN(R1, 3), 0)").unwrap(),
            1,
            &t,
            &ctx,
        );
        assert_eq!(out, vec![3.0]);
    }

    #[test]
    fn fwdsum_window_literal() {
        let t = periods_timeline(5);
        let mut ctx: Context = FxHashMap::default();
        ctx.insert("X".into(), vec![1.0, 1.0, 1.0, 1.0, 1.0]);
        let out = evaluate_non_cluster(&parse("FWDSUM(X,2)").unwrap(), 5, &t, &ctx);
        assert_eq!(out, vec![2.0, 2.0, 2.0, 1.0, 1.0]);
    }

    #[test]
    fn maxval_broadcasts_scalar() {
        let t = periods_timeline(3);
        let mut ctx: Context = FxHashMap::default();
        ctx.insert("X".into(), vec![1.0, 9.0, 3.0]);
        let out = evaluate_non_cluster(&parse("MAXVAL(X)").unwrap(), 3, &t, &ctx);
        assert_eq!(out, vec![9.0, 9.0, 9.0]);
    }
}
