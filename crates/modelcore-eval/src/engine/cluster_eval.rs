//! Period-by-period cluster evaluation (`spec.md` §4.8).
//!
//! Cluster members are pre-parsed once: every `SHIFT`/`PREVSUM`/`PREVVAL`/
//! `CUMSUM`/`CUMPROD`/`COUNT`/`MAXVAL`/`FWDSUM` call becomes a placeholder
//! `Ref` plus a bit of accumulator state carried across the period loop.
//! Each member's full output vector is pre-allocated and aliased into the
//! shared context so that other cluster members (and the lag reads within
//! this very member) see values as they're written, period by period.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use modelcore_parse::Expr;

use crate::context::Context;
use crate::interpreter::{eval_at, eval_with_resolver};
use crate::timeline::Timeline;

static EMPTY_LOCALS: Lazy<Context> = Lazy::new(Context::default);

enum State {
    Cumsum { inner: Expr, acc: f64 },
    Cumprod { inner: Expr, acc: f64 },
    CumsumY { inner: Expr, acc: f64, seen_transition: bool, prev_seen: Option<f64> },
    CumprodY { inner: Expr, acc: f64, seen_transition: bool, prev_seen: Option<f64> },
    Count { inner: Expr, acc: f64 },
    Prevsum { inner: Expr, acc: f64, pending: f64 },
    Prevval { inner: Expr },
    Shift { inner: Expr, n: i64 },
    Maxval { inner: Expr, cached: Option<f64> },
    Fwdsum { inner: Expr, window: usize, cached: Option<Vec<f64>> },
}

struct Member {
    node: String,
    formula: Expr,
    placeholders: FxHashMap<String, State>,
}

fn resolve_scalar_once(expr: &Expr, ctx: &Context) -> f64 {
    eval_at(expr, 0, ctx, &EMPTY_LOCALS)
}

fn is_array_fn(name: &str) -> bool {
    matches!(
        name,
        "CUMSUM" | "CUMPROD" | "CUMSUM_Y" | "CUMPROD_Y" | "SHIFT" | "PREVSUM" | "PREVVAL"
            | "COUNT" | "MAXVAL" | "FWDSUM"
    )
}

fn arg_or_zero(args: &[Expr], i: usize) -> Expr {
    args.get(i).cloned().unwrap_or_else(|| Expr::number(0.0))
}

fn lower(
    expr: &Expr,
    ctx: &Context,
    placeholders: &mut FxHashMap<String, State>,
    counter: &mut u32,
) -> Expr {
    match expr {
        Expr::Number(_) | Expr::Ref(_) => expr.clone(),
        Expr::Unary { op, expr: inner } => Expr::Unary {
            op: *op,
            expr: Box::new(lower(inner, ctx, placeholders, counter)),
        },
        Expr::Binary { op, left, right } => Expr::Binary {
            op: *op,
            left: Box::new(lower(left, ctx, placeholders, counter)),
            right: Box::new(lower(right, ctx, placeholders, counter)),
        },
        Expr::Call { name, args } => {
            if !is_array_fn(name) {
                return Expr::Call {
                    name: name.clone(),
                    args: args.iter().map(|a| lower(a, ctx, placeholders, counter)).collect(),
                };
            }
            let inner = lower(&arg_or_zero(args, 0), ctx, placeholders, counter);
            let state = match name.as_str() {
                "CUMSUM" => State::Cumsum { inner, acc: 0.0 },
                "CUMPROD" => State::Cumprod { inner, acc: 1.0 },
                "CUMSUM_Y" => State::CumsumY { inner, acc: 0.0, seen_transition: false, prev_seen: None },
                "CUMPROD_Y" => State::CumprodY { inner, acc: 1.0, seen_transition: false, prev_seen: None },
                "COUNT" => State::Count { inner, acc: 0.0 },
                "PREVSUM" => State::Prevsum { inner, acc: 0.0, pending: 0.0 },
                "PREVVAL" => State::Prevval { inner },
                "SHIFT" => {
                    let n_expr = arg_or_zero(args, 1);
                    let n = resolve_scalar_once(&n_expr, ctx).round() as i64;
                    State::Shift { inner, n }
                }
                "MAXVAL" => State::Maxval { inner, cached: None },
                "FWDSUM" => {
                    let w_expr = arg_or_zero(args, 1);
                    let window = resolve_scalar_once(&w_expr, ctx).round().max(0.0) as usize;
                    let window = if window == 0 { 6 } else { window };
                    State::Fwdsum { inner, window, cached: None }
                }
                _ => unreachable!(),
            };
            *counter += 1;
            let placeholder = format!("__cl{}", *counter);
            placeholders.insert(placeholder.clone(), state);
            Expr::Ref(placeholder)
        }
    }
}

/// Evaluate `e` at period `j` against the context as it stands *so far*
/// (cluster-member vectors are pre-allocated and zero before they're
/// written, exactly as `spec.md` §4.8 step 2 describes).
fn eval_inner_at(inner: &Expr, j: usize, ctx: &Context) -> f64 {
    eval_at(inner, j, ctx, &EMPTY_LOCALS)
}

pub fn evaluate_cluster(members_order: &[String], formulas: &FxHashMap<String, Expr>, timeline: &Timeline, ctx: &mut Context) {
    let periods = timeline.periods as usize;
    for m in members_order {
        ctx.entry(m.clone()).or_insert_with(|| vec![0.0; periods]);
    }

    let mut members: Vec<Member> = Vec::with_capacity(members_order.len());
    for node in members_order {
        let formula = formulas.get(node).cloned().unwrap_or_else(|| Expr::number(0.0));
        let mut placeholders = FxHashMap::default();
        let mut counter = 0u32;
        let lowered = lower(&formula, ctx, &mut placeholders, &mut counter);
        members.push(Member { node: node.clone(), formula: lowered, placeholders });
    }

    for i in 0..periods {
        for member in members.iter_mut() {
            let mut scalars: FxHashMap<String, f64> = FxHashMap::default();
            for (placeholder, state) in member.placeholders.iter_mut() {
                let value = match state {
                    State::Cumsum { inner, acc } => {
                        *acc += eval_inner_at(inner, i, ctx);
                        *acc
                    }
                    State::Cumprod { inner, acc } => {
                        *acc *= eval_inner_at(inner, i, ctx);
                        *acc
                    }
                    State::CumsumY { inner, acc, seen_transition, prev_seen } => {
                        let is_new_year = i > 0 && timeline.year[i] != timeline.year[i - 1];
                        if is_new_year {
                            if let Some(last) = *prev_seen {
                                *acc += last;
                            }
                            *seen_transition = true;
                        }
                        *prev_seen = Some(eval_inner_at(inner, i, ctx));
                        if *seen_transition { *acc } else { 0.0 }
                    }
                    State::CumprodY { inner, acc, seen_transition, prev_seen } => {
                        let is_new_year = i > 0 && timeline.year[i] != timeline.year[i - 1];
                        if is_new_year {
                            if let Some(last) = *prev_seen {
                                *acc *= last;
                            }
                            *seen_transition = true;
                        }
                        *prev_seen = Some(eval_inner_at(inner, i, ctx));
                        if *seen_transition { *acc } else { 1.0 }
                    }
                    State::Count { inner, acc } => {
                        if eval_inner_at(inner, i, ctx) != 0.0 {
                            *acc += 1.0;
                        }
                        *acc
                    }
                    State::Prevsum { acc, .. } => *acc,
                    State::Prevval { inner } => {
                        if i > 0 {
                            eval_inner_at(inner, i - 1, ctx)
                        } else {
                            0.0
                        }
                    }
                    State::Shift { inner, n } => {
                        let j = i as i64 - *n;
                        if j >= 0 {
                            eval_inner_at(inner, j as usize, ctx)
                        } else {
                            0.0
                        }
                    }
                    State::Maxval { inner, cached } => {
                        *cached.get_or_insert_with(|| {
                            (0..periods)
                                .map(|k| eval_inner_at(inner, k, ctx))
                                .filter(|v| v.is_finite())
                                .fold(f64::NEG_INFINITY, f64::max)
                        })
                    }
                    State::Fwdsum { inner, window, cached } => {
                        let arr = cached.get_or_insert_with(|| {
                            (0..periods).map(|k| eval_inner_at(inner, k, ctx)).collect()
                        });
                        let end = (i + *window).min(periods);
                        arr[i..end].iter().sum()
                    }
                };
                let value = if value.is_finite() { value } else { 0.0 };
                scalars.insert(placeholder.clone(), value);
            }

            let value = eval_with_resolver(&member.formula, i, &|name, _| {
                scalars.get(name).copied().unwrap_or_else(|| {
                    ctx.get(name).and_then(|v| v.get(i)).copied().unwrap_or(0.0)
                })
            });

            if let Some(out) = ctx.get_mut(&member.node) {
                out[i] = value;
            }
        }

        // Advance PREVSUM accumulators only after every member has written
        // period i (spec.md §4.8 step 4).
        for member in members.iter_mut() {
            for state in member.placeholders.values_mut() {
                if let State::Prevsum { inner, acc, pending } = state {
                    *pending = eval_inner_at(inner, i, ctx);
                    *acc += *pending;
                }
            }
        }
    }
}
