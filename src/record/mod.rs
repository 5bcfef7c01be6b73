// src/record/mod.rs
//! Energy record data model
//!
//! Every energy figure travels as a tagged value (magnitude plus an explicit
//! power-of-ten exponent relative to joules) together with the metric it
//! measures and the source that reported it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Exponent of the canonical unit (pJ) relative to joules
pub const PICOJOULE_EXPONENT: i32 = -12;

/// Report format an energy figure was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    RawStats,
    ErtSummary,
    DerivedSummary,
}

impl Source {
    pub fn all() -> [Source; 3] {
        [Source::RawStats, Source::ErtSummary, Source::DerivedSummary]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Source::RawStats => "raw_stats",
            Source::ErtSummary => "ert_summary",
            Source::DerivedSummary => "derived_summary",
        }
    }

    /// Unit a source reports in when a value carries no unit of its own.
    /// The derived summary writes joules while the other two write pJ.
    pub fn native_unit_exponent(&self) -> i32 {
        match self {
            Source::RawStats => PICOJOULE_EXPONENT,
            Source::ErtSummary => PICOJOULE_EXPONENT,
            Source::DerivedSummary => 0,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "raw_stats" | "raw" | "stats" => Ok(Source::RawStats),
            "ert_summary" | "ert" => Ok(Source::ErtSummary),
            "derived_summary" | "derived" | "summary" => Ok(Source::DerivedSummary),
            other => Err(format!("Unknown report source: {}", other)),
        }
    }
}

/// Individual energy metric as named by its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    LeakagePerInstanceCycle,
    LeakageTotal,
    VectorAccessEnergy,
    EnergyPerScalarAccess,
    EnergyPerInstance,
    EnergyTotal,
    PerComponentEnergy,
    PerComputeEnergy,
    ErtWrite,
    ErtRead,
    ErtUpdate,
}

impl Metric {
    /// Semantic axis used to join metrics across sources
    pub fn class(&self) -> MetricClass {
        match self {
            Metric::LeakagePerInstanceCycle => MetricClass::LeakagePerCycle,
            Metric::LeakageTotal => MetricClass::LeakageTotal,
            // The stats' vector access energy is the reference table's write action
            Metric::VectorAccessEnergy | Metric::ErtWrite => MetricClass::AccessEnergy,
            Metric::ErtRead => MetricClass::ReadEnergy,
            Metric::ErtUpdate => MetricClass::UpdateEnergy,
            Metric::EnergyPerScalarAccess => MetricClass::ScalarAccessEnergy,
            Metric::EnergyPerInstance => MetricClass::InstanceEnergy,
            Metric::EnergyTotal | Metric::PerComponentEnergy => MetricClass::ComponentTotal,
            Metric::PerComputeEnergy => MetricClass::ComputeEnergy,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::LeakagePerInstanceCycle => "leakage_per_instance_cycle",
            Metric::LeakageTotal => "leakage_total",
            Metric::VectorAccessEnergy => "vector_access_energy",
            Metric::EnergyPerScalarAccess => "energy_per_scalar_access",
            Metric::EnergyPerInstance => "energy_per_instance",
            Metric::EnergyTotal => "energy_total",
            Metric::PerComponentEnergy => "per_component_energy",
            Metric::PerComputeEnergy => "per_compute_energy",
            Metric::ErtWrite => "ert_write",
            Metric::ErtRead => "ert_read",
            Metric::ErtUpdate => "ert_update",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricClass {
    LeakagePerCycle,
    LeakageTotal,
    AccessEnergy,
    ReadEnergy,
    UpdateEnergy,
    ScalarAccessEnergy,
    InstanceEnergy,
    ComponentTotal,
    ComputeEnergy,
}

impl MetricClass {
    pub fn label(&self) -> &'static str {
        match self {
            MetricClass::LeakagePerCycle => "leakage_per_cycle",
            MetricClass::LeakageTotal => "leakage_total",
            MetricClass::AccessEnergy => "access_energy",
            MetricClass::ReadEnergy => "read_energy",
            MetricClass::UpdateEnergy => "update_energy",
            MetricClass::ScalarAccessEnergy => "scalar_access_energy",
            MetricClass::InstanceEnergy => "instance_energy",
            MetricClass::ComponentTotal => "component_total",
            MetricClass::ComputeEnergy => "compute_energy",
        }
    }
}

impl fmt::Display for MetricClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Energy magnitude tagged with its power-of-ten scale relative to joules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Energy {
    pub value: f64,
    pub unit_exponent: i32,
}

impl Energy {
    pub fn new(value: f64, unit_exponent: i32) -> Self {
        Self { value, unit_exponent }
    }

    pub fn picojoules(value: f64) -> Self {
        Self::new(value, PICOJOULE_EXPONENT)
    }

    pub fn joules(value: f64) -> Self {
        Self::new(value, 0)
    }

    /// Re-express the same physical quantity at another exponent
    pub fn rescale(&self, target_exponent: i32) -> Self {
        let shift = self.unit_exponent - target_exponent;
        Self::new(self.value * 10f64.powi(shift), target_exponent)
    }

    pub fn to_picojoules(&self) -> Self {
        self.rescale(PICOJOULE_EXPONENT)
    }

    pub fn is_picojoules(&self) -> bool {
        self.unit_exponent == PICOJOULE_EXPONENT
    }

    pub fn as_joules(&self) -> f64 {
        self.rescale(0).value
    }
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match unit_symbol(self.unit_exponent) {
            Some(symbol) => write!(f, "{:.6e} {}", self.value, symbol),
            None => write!(f, "{:.6e} x 1e{} J", self.value, self.unit_exponent),
        }
    }
}

/// Map an energy unit label to its exponent relative to joules
pub fn unit_exponent(unit: &str) -> Option<i32> {
    match unit.trim() {
        "J" | "j" => Some(0),
        "mJ" | "mj" => Some(-3),
        "uJ" | "uj" | "µJ" => Some(-6),
        "nJ" | "nj" => Some(-9),
        "pJ" | "pj" => Some(-12),
        "fJ" | "fj" => Some(-15),
        "aJ" | "aj" => Some(-18),
        _ => None,
    }
}

pub fn unit_symbol(exponent: i32) -> Option<&'static str> {
    match exponent {
        0 => Some("J"),
        -3 => Some("mJ"),
        -6 => Some("uJ"),
        -9 => Some("nJ"),
        -12 => Some("pJ"),
        -15 => Some("fJ"),
        -18 => Some("aJ"),
        _ => None,
    }
}

/// Where a record was read from, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub path: Option<PathBuf>,
    pub line: Option<usize>,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<input>".to_string());
        match self.line {
            Some(line) => write!(f, "{}:{}", path, line),
            None => f.write_str(&path),
        }
    }
}

/// Non-fatal scale problem attached to a normalized record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScaleAmbiguityWarning {
    /// Another source reports the same quantity at this magnitude shifted
    /// by a whole SI prefix step: this value is `10^decades` times theirs.
    PrefixOffset {
        decades: i32,
        counterpart: Source,
        counterpart_value_pj: f64,
    },
    /// Normalized magnitude falls outside the plausible band
    ImplausibleMagnitude {
        value_pj: f64,
        lower_pj: f64,
        upper_pj: f64,
    },
}

impl fmt::Display for ScaleAmbiguityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleAmbiguityWarning::PrefixOffset { decades, counterpart, counterpart_value_pj } => write!(
                f,
                "magnitude is 1e{} times the {} reading ({:.6e} pJ); possible unit prefix mix-up",
                decades, counterpart, counterpart_value_pj
            ),
            ScaleAmbiguityWarning::ImplausibleMagnitude { value_pj, lower_pj, upper_pj } => write!(
                f,
                "{:.6e} pJ is outside the plausible range [{:.1e}, {:.1e}] pJ",
                value_pj, lower_pj, upper_pj
            ),
        }
    }
}

/// One observed energy or leakage figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyRecord {
    pub source: Source,
    pub component_id: String,
    pub metric: Metric,
    pub energy: Energy,
    /// Component was excluded from DRAM coalescing in the producing run
    pub coalesce_excluded: bool,
    pub origin: Option<Origin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScaleAmbiguityWarning>,
}

impl EnergyRecord {
    pub fn new(source: Source, component_id: impl Into<String>, metric: Metric, energy: Energy) -> Self {
        Self {
            source,
            component_id: component_id.into(),
            metric,
            energy,
            coalesce_excluded: false,
            origin: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_coalesce_excluded(mut self, excluded: bool) -> Self {
        self.coalesce_excluded = excluded;
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn value(&self) -> f64 {
        self.energy.value
    }

    pub fn unit_exponent(&self) -> i32 {
        self.energy.unit_exponent
    }

    pub fn key(&self) -> ComparisonKey {
        ComparisonKey {
            component_id: self.component_id.clone(),
            metric_class: self.metric.class(),
        }
    }
}

/// Join key for cross-source comparison
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComparisonKey {
    pub component_id: String,
    pub metric_class: MetricClass,
}

/// Reduce a hierarchical, instance-ranged component name to its leaf identity.
///
/// `system_top_level.main_memory[1..1]` becomes `main_memory`.
pub fn canonical_component_id(name: &str) -> String {
    let trimmed = name.trim();
    let without_range = match trimmed.find('[') {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };
    let leaf = without_range.rsplit('.').next().unwrap_or(without_range);
    leaf.trim().to_string()
}
