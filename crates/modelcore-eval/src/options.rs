//! Run-level configuration (`spec.md` §4.10's "ambient" knobs), mirroring
//! the teacher's `EvalConfig` passed into `Engine::new` — a small struct of
//! defaults the caller can override, rather than a file-based config layer.
//!
//! Every module template reads its own tunables (tolerance, iteration caps)
//! from its per-instance `ParamValue`s first; [`EvalOptions`] only supplies
//! the fallback when an instance leaves one of those unset.

/// Solver-wide defaults, currently consumed only by
/// [`crate::modules::debt_sizing`]'s binary search — the one iterative
/// module template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalOptions {
    /// Binary-search iteration cap used when a `debt_sizing` instance
    /// doesn't specify its own `maxIterations`.
    pub max_iterations: u32,
    /// Upper/lower bound convergence gap used when a `debt_sizing` instance
    /// doesn't specify its own `tolerance`.
    pub dscr_tolerance: f64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            dscr_tolerance: 1e-6,
        }
    }
}
