//! Facade crate: re-exports the calculation engine's public surface so
//! downstream users depend on one crate instead of the three workspace
//! members directly.

pub use modelcore_common as common;
pub use modelcore_parse as parse;

pub use modelcore_eval::{
    run_model, run_model_with_options, CalcType, Calculation, CalculationsDoc, Compounding,
    Config, Context, EntryMode, EvalOptions, Freq, IndexDef, Input, InputGroup, KeyPeriod,
    ModelInputs, Module, ParamValue, RunResult, Timeline,
};

pub use modelcore_common::error::{EngineError, EngineErrorKind};
