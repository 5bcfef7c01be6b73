// src/reconcile/mod.rs
//! Cross-source energy reconciliation
//!
//! Joins normalized records on (component, metric class), compares every
//! pair reported by different sources and classifies the relative delta.
//! Per-compute energies are additionally checked against
//! `per_component_energy / computes` from the same source.

pub mod finding;

pub use finding::{Classification, DiscrepancyFinding, FindingKind, SkippedCheck, Uncompared};

use crate::config::ToleranceConfig;
use crate::record::{ComparisonKey, Energy, EnergyRecord, Metric, MetricClass, Source};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// `|a - b| / max(|a|, |b|, epsilon)`
pub fn relative_delta(a: f64, b: f64, epsilon: f64) -> f64 {
    let scale = a.abs().max(b.abs()).max(epsilon);
    (a - b).abs() / scale
}

impl ToleranceConfig {
    pub fn classify(&self, relative_delta: f64) -> Classification {
        if relative_delta <= self.consistent {
            Classification::Consistent
        } else if relative_delta <= self.drift {
            Classification::Drift
        } else {
            // NaN lands here too
            Classification::Anomalous
        }
    }
}

/// Run-level figures the reconciler needs beyond the records themselves
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileContext {
    pub computes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub findings: Vec<DiscrepancyFinding>,
    pub uncompared: Vec<Uncompared>,
    pub skipped: Vec<SkippedCheck>,
}

pub struct Reconciler {
    tolerance: ToleranceConfig,
}

impl Reconciler {
    pub fn new(tolerance: ToleranceConfig) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> &ToleranceConfig {
        &self.tolerance
    }

    /// Compare all records; output order is independent of input order.
    ///
    /// Values are compared on the pJ scale whatever exponent they carry, but
    /// scale warnings only exist on records that went through the normalizer.
    pub fn reconcile(&self, records: &[EnergyRecord], context: &ReconcileContext) -> Reconciliation {
        let mut groups: BTreeMap<ComparisonKey, Vec<&EnergyRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.key()).or_default().push(record);
        }

        let mut result = Reconciliation::default();

        for (key, members) in &groups {
            let sources: BTreeSet<Source> = members.iter().map(|r| r.source).collect();
            if sources.len() < 2 {
                result.uncompared.push(Uncompared {
                    component_id: key.component_id.clone(),
                    metric_class: key.metric_class,
                    sources: sources.into_iter().collect(),
                });
                continue;
            }

            for (pos, &x) in members.iter().enumerate() {
                for &y in &members[pos + 1..] {
                    if x.source == y.source {
                        continue;
                    }
                    let (a, b) = if x.source <= y.source { (x, y) } else { (y, x) };
                    result.findings.push(self.compare(key, a, b));
                }
            }
        }

        self.check_derivations(records, context, &mut result);

        result.findings.sort_by(|x, y| {
            x.component_id
                .cmp(&y.component_id)
                .then(x.metric_class.cmp(&y.metric_class))
                .then(x.kind.cmp(&y.kind))
                .then(x.source_a.cmp(&y.source_a))
                .then(x.source_b.cmp(&y.source_b))
                .then(x.value_a.value.total_cmp(&y.value_a.value))
                .then(x.value_b.value.total_cmp(&y.value_b.value))
        });
        result.skipped.sort_by(|x, y| x.component_id.cmp(&y.component_id));

        for finding in &result.findings {
            if finding.classification.is_failure() {
                log::warn!("{}", finding);
            } else {
                log::debug!("{}", finding);
            }
        }

        result
    }

    fn compare(&self, key: &ComparisonKey, a: &EnergyRecord, b: &EnergyRecord) -> DiscrepancyFinding {
        let mut warnings = a.warnings.clone();
        warnings.extend(b.warnings.iter().cloned());

        let (relative, classification) = if a.coalesce_excluded != b.coalesce_excluded {
            log::info!(
                "{} {}: no-coalesce differs between {} and {}; skipping numeric comparison",
                key.component_id, key.metric_class, a.source, b.source
            );
            (None, Classification::ConfigMismatch)
        } else {
            let (a_pj, b_pj) = (a.energy.to_picojoules(), b.energy.to_picojoules());
            let delta = relative_delta(a_pj.value, b_pj.value, self.tolerance.epsilon);
            (Some(delta), self.tolerance.classify(delta))
        };

        DiscrepancyFinding {
            component_id: key.component_id.clone(),
            metric_class: key.metric_class,
            kind: FindingKind::CrossSource,
            source_a: a.source,
            value_a: a.energy,
            source_b: b.source,
            value_b: b.energy,
            relative_delta: relative,
            classification,
            warnings,
        }
    }

    /// per_component_energy / computes must match the reported per_compute_energy
    fn check_derivations(
        &self,
        records: &[EnergyRecord],
        context: &ReconcileContext,
        result: &mut Reconciliation,
    ) {
        let per_component: BTreeMap<(Source, &str), &EnergyRecord> = records
            .iter()
            .filter(|r| r.metric == Metric::PerComponentEnergy)
            .map(|r| ((r.source, r.component_id.as_str()), r))
            .collect();

        for per_compute in records.iter().filter(|r| r.metric == Metric::PerComputeEnergy) {
            let skip = |reason: String| SkippedCheck {
                component_id: per_compute.component_id.clone(),
                source: per_compute.source,
                reason,
            };

            let computes = match context.computes {
                Some(n) if n > 0 => n,
                Some(_) => {
                    result.skipped.push(skip("computes is zero".to_string()));
                    continue;
                }
                None => {
                    log::warn!(
                        "{}: per-compute derivation not checked, no computes count available",
                        per_compute.component_id
                    );
                    result.skipped.push(skip("no computes count available".to_string()));
                    continue;
                }
            };

            let Some(total) = per_component.get(&(per_compute.source, per_compute.component_id.as_str())) else {
                result.skipped.push(skip("no per_component_energy to derive from".to_string()));
                continue;
            };

            let total_pj = total.energy.to_picojoules();
            let derived = Energy::picojoules(total_pj.value / computes as f64);
            let reported = per_compute.energy.to_picojoules();
            let delta = relative_delta(derived.value, reported.value, self.tolerance.epsilon);

            let mut warnings = total.warnings.clone();
            warnings.extend(per_compute.warnings.iter().cloned());

            result.findings.push(DiscrepancyFinding {
                component_id: per_compute.component_id.clone(),
                metric_class: MetricClass::ComputeEnergy,
                kind: FindingKind::Derivation,
                source_a: per_compute.source,
                value_a: derived,
                source_b: per_compute.source,
                value_b: reported,
                relative_delta: Some(delta),
                classification: self.tolerance.classify(delta),
                warnings,
            });
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ToleranceConfig::default())
    }
}

/// Compare raw magnitudes while ignoring the unit exponents.
///
/// This is what a unit-blind comparison of two reports does; it exists so the
/// exponent-aware path can be checked against it.
pub fn naive_compare(a: &EnergyRecord, b: &EnergyRecord, tolerance: &ToleranceConfig) -> (f64, Classification) {
    let delta = relative_delta(a.value(), b.value(), tolerance.epsilon);
    (delta, tolerance.classify(delta))
}
