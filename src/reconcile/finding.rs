// src/reconcile/finding.rs
//! Reconciliation output types

use crate::record::{Energy, MetricClass, ScaleAmbiguityWarning, Source};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Consistent,
    Drift,
    Anomalous,
    /// The two runs disagree on no-coalesce for this component
    ConfigMismatch,
}

impl Classification {
    /// Findings that should fail a regression pipeline
    pub fn is_failure(&self) -> bool {
        matches!(self, Classification::Anomalous | Classification::ConfigMismatch)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::Consistent => "consistent",
            Classification::Drift => "drift",
            Classification::Anomalous => "anomalous",
            Classification::ConfigMismatch => "config_mismatch",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Two sources reporting the same quantity
    CrossSource,
    /// per_component_energy / computes against per_compute_energy
    Derivation,
}

impl FindingKind {
    pub fn label(&self) -> &'static str {
        match self {
            FindingKind::CrossSource => "cross_source",
            FindingKind::Derivation => "derivation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyFinding {
    pub component_id: String,
    pub metric_class: MetricClass,
    pub kind: FindingKind,
    pub source_a: Source,
    pub value_a: Energy,
    pub source_b: Source,
    pub value_b: Energy,
    /// `None` when the comparison was invalidated by a configuration mismatch
    pub relative_delta: Option<f64>,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScaleAmbiguityWarning>,
}

impl fmt::Display for DiscrepancyFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delta = match self.relative_delta {
            Some(delta) => format!("{:.2}%", delta * 100.0),
            None => "n/a".to_string(),
        };
        write!(
            f,
            "{} {} [{}]: {}={} vs {}={} delta={} -> {}",
            self.component_id,
            self.metric_class,
            self.kind.label(),
            self.source_a,
            self.value_a,
            self.source_b,
            self.value_b,
            delta,
            self.classification
        )
    }
}

/// A join key that only one source reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uncompared {
    pub component_id: String,
    pub metric_class: MetricClass,
    pub sources: Vec<Source>,
}

/// A derivation check that could not be run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCheck {
    pub component_id: String,
    pub source: Source,
    pub reason: String,
}
