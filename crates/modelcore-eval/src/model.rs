//! The external input data model (`spec.md` §3, §6.1).
//!
//! These are plain data — no behaviour lives here beyond small validation
//! helpers. `refmap` and `driver` consume them; nothing upstream of
//! `run_model` is modelled (persistence, HTTP, UI are explicitly out of
//! scope per `spec.md` §1).

use rustc_hash::FxHashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `{startYear, startMonth, endYear, endMonth}` (`spec.md` §3.2).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Config {
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct KeyPeriod {
    pub id: u32,
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EntryMode {
    Constant,
    Values,
    Series,
    Lookup,
    Lookup2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Freq {
    M,
    Q,
    Y,
    FY,
}

impl Freq {
    /// Months-per-entry used when spreading a scalar series value across
    /// months (`spec.md` §4.3 "Per-input array construction").
    pub fn months_per_entry(self) -> u32 {
        match self {
            Freq::M => 1,
            Freq::Q => 3,
            Freq::Y | Freq::FY => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct InputGroup {
    pub id: u32,
    pub entry_mode: EntryMode,
    pub group_type: Option<String>,
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: Option<i32>,
    pub end_month: Option<u32>,
    pub periods: Option<u32>,
    pub frequency: Option<Freq>,
    pub linked_key_period_id: Option<u32>,
    pub subgroups: Option<Vec<String>>,
    pub selected_indices: Option<Vec<u32>>,
    pub lookup_start_year: Option<i32>,
    pub lookup_start_month: Option<u32>,
}

impl Default for InputGroup {
    fn default() -> Self {
        Self {
            id: 0,
            entry_mode: EntryMode::Constant,
            group_type: None,
            start_year: 0,
            start_month: 1,
            end_year: None,
            end_month: None,
            periods: None,
            frequency: None,
            linked_key_period_id: None,
            subgroups: None,
            selected_indices: None,
            lookup_start_year: None,
            lookup_start_month: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Input {
    pub id: u32,
    pub group_id: u32,
    pub subgroup_id: Option<String>,
    pub value: Option<f64>,
    pub values: Option<FxHashMap<u32, f64>>,
    pub value_frequency: Option<Freq>,
    pub series_frequency: Option<Freq>,
    pub series_payment_month: Option<u32>,
    pub series_start_date: Option<(i32, u32)>,
    pub series_end_date: Option<(i32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Compounding {
    Annual,
    Monthly,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct IndexDef {
    pub id: u32,
    pub base_year: i32,
    pub base_month: u32,
    /// Annual rate, percent (e.g. `2.5` for 2.5%).
    pub rate: f64,
    pub compounding: Compounding,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ModelInputs {
    pub config: Config,
    pub key_periods: Vec<KeyPeriod>,
    pub input_groups: Vec<InputGroup>,
    pub inputs: Vec<Input>,
    pub indices: Vec<IndexDef>,
}

/// `spec.md` §3.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CalcType {
    Flow,
    Stock,
    StockStart,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Calculation {
    pub id: u32,
    pub name: String,
    pub formula: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub calc_type: CalcType,
}

impl Calculation {
    pub fn node_name(&self) -> String {
        format!("R{}", self.id)
    }
}

/// `spec.md` §3.5 — a module input is either a literal or a reference.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ParamValue {
    Number(f64),
    Ref(String),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Module {
    pub template_id: String,
    pub name: String,
    pub inputs: FxHashMap<String, ParamValue>,
    pub enabled: bool,
    pub converted: bool,
}

impl Module {
    pub fn node_name(&self, idx: u32) -> String {
        format!("M{idx}")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CalculationsDoc {
    pub calculations: Vec<Calculation>,
    pub modules: Vec<Module>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub m_ref_map: FxHashMap<String, String>,
}
