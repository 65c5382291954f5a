//! The mutable evaluation context: every reference name the DSL can resolve,
//! mapped to its `periods`-long vector (`spec.md` §3.3, §4.2).
//!
//! `refmap` seeds this from the model's non-formula inputs; `driver` then
//! grows it one calculation/module output at a time as the scheduler visits
//! each node. Per-name, per-period lookup (with the zero-fill `spec.md` §7
//! calls for on a miss) lives in `interpreter::lookup`, the one place that
//! actually needs it.

use rustc_hash::FxHashMap;

pub type Context = FxHashMap<String, Vec<f64>>;
