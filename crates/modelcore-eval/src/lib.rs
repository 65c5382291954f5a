//! Deterministic spreadsheet-style financial modeling engine.
//!
//! [`driver::run_model`] is the single entry point: given [`model::ModelInputs`]
//! and a [`model::CalculationsDoc`], it builds the timeline, the reference map,
//! the dependency graph and its SHIFT-cycle clusters, schedules evaluation
//! order, and returns a [`driver::RunResult`] with every calculation and
//! module output resolved.

pub mod context;
pub mod driver;
pub mod engine;
pub mod interpreter;
pub mod model;
pub mod modules;
pub mod options;
pub mod refmap;
pub mod timeline;

pub use context::Context;
pub use driver::{run_model, run_model_with_options, RunResult};
pub use options::EvalOptions;
pub use model::{
    CalcType, Calculation, CalculationsDoc, Compounding, Config, EntryMode, Freq, IndexDef, Input,
    InputGroup, KeyPeriod, Module, ModelInputs, ParamValue,
};
pub use timeline::Timeline;
