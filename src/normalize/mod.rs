// src/normalize/mod.rs
//! Unit and scale normalization
//!
//! Forces every record onto the picojoule scale and flags magnitudes that
//! look like a unit-prefix slip. Suspicious values are flagged, never
//! corrected: the normalizer cannot know which reading is the right one.

use crate::config::ScaleConfig;
use crate::reconcile::relative_delta;
use crate::record::{ComparisonKey, EnergyRecord, ScaleAmbiguityWarning};
use std::collections::BTreeMap;

pub struct Normalizer {
    config: ScaleConfig,
}

impl Normalizer {
    pub fn new(config: ScaleConfig) -> Self {
        Self { config }
    }

    /// Rescale every record to pJ and recompute its scale warnings.
    ///
    /// Idempotent: warnings are rebuilt from scratch on every call.
    pub fn normalize(&self, records: Vec<EnergyRecord>) -> Vec<EnergyRecord> {
        let mut normalized: Vec<EnergyRecord> = records
            .into_iter()
            .map(|mut record| {
                record.energy = record.energy.to_picojoules();
                record.warnings.clear();
                record
            })
            .collect();

        for record in &mut normalized {
            if let Some(warning) = self.plausibility_warning(record.value()) {
                log::warn!(
                    "{} {} ({}): {}",
                    record.component_id, record.metric, record.source, warning
                );
                record.warnings.push(warning);
            }
        }

        let mut groups: BTreeMap<ComparisonKey, Vec<usize>> = BTreeMap::new();
        for (idx, record) in normalized.iter().enumerate() {
            groups.entry(record.key()).or_default().push(idx);
        }

        for indices in groups.values() {
            for (pos, &i) in indices.iter().enumerate() {
                for &j in &indices[pos + 1..] {
                    if normalized[i].source == normalized[j].source {
                        continue;
                    }
                    let (a, b) = (normalized[i].value(), normalized[j].value());
                    let Some(decades) = self.prefix_offset(a, b) else {
                        continue;
                    };
                    log::warn!(
                        "{} {}: {} reads 1e{} times {} ({:.6e} pJ vs {:.6e} pJ)",
                        normalized[i].component_id,
                        normalized[i].metric.class(),
                        normalized[i].source,
                        decades,
                        normalized[j].source,
                        a,
                        b
                    );
                    let counterpart_j = normalized[j].source;
                    let counterpart_i = normalized[i].source;
                    normalized[i].warnings.push(ScaleAmbiguityWarning::PrefixOffset {
                        decades,
                        counterpart: counterpart_j,
                        counterpart_value_pj: b,
                    });
                    normalized[j].warnings.push(ScaleAmbiguityWarning::PrefixOffset {
                        decades: -decades,
                        counterpart: counterpart_i,
                        counterpart_value_pj: a,
                    });
                }
            }
        }

        normalized
    }

    fn plausibility_warning(&self, value_pj: f64) -> Option<ScaleAmbiguityWarning> {
        let magnitude = value_pj.abs();
        if magnitude == 0.0 {
            return None;
        }
        let (lower, upper) = (self.config.plausible_min_pj, self.config.plausible_max_pj);
        if magnitude.is_finite() && magnitude >= lower && magnitude <= upper {
            return None;
        }
        Some(ScaleAmbiguityWarning::ImplausibleMagnitude {
            value_pj,
            lower_pj: lower,
            upper_pj: upper,
        })
    }

    /// Decade shift `k` such that `a ≈ b * 10^k`, for a configured prefix step
    pub fn prefix_offset(&self, a: f64, b: f64) -> Option<i32> {
        if a == 0.0 || b == 0.0 || !a.is_finite() || !b.is_finite() {
            return None;
        }
        for &step in &self.config.prefix_steps {
            for decades in [step, -step] {
                let shifted = b * 10f64.powi(decades);
                if relative_delta(a, shifted, f64::MIN_POSITIVE) <= self.config.match_tolerance {
                    return Some(decades);
                }
            }
        }
        None
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(ScaleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Energy, Metric, Source, PICOJOULE_EXPONENT};

    fn record(source: Source, metric: Metric, energy: Energy) -> EnergyRecord {
        EnergyRecord::new(source, "main_memory", metric, energy)
    }

    #[test]
    fn test_forces_picojoule_scale() {
        let normalizer = Normalizer::default();
        let records = vec![
            record(Source::DerivedSummary, Metric::PerComponentEnergy, Energy::joules(3.58e-6)),
            record(Source::RawStats, Metric::EnergyTotal, Energy::new(2.0, -9)),
        ];
        let normalized = normalizer.normalize(records);

        assert!(normalized.iter().all(|r| r.unit_exponent() == PICOJOULE_EXPONENT));
        assert!((normalized[0].value() - 3.58e6).abs() < 1e-3);
        assert!((normalized[1].value() - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_flags_twelve_decade_offset_without_fixing_it() {
        let normalizer = Normalizer::default();
        // Summary value mislabelled: 3.58e6 "J" against 3.58e6 pJ
        let records = vec![
            record(Source::DerivedSummary, Metric::PerComponentEnergy, Energy::joules(3.58e6)),
            record(Source::RawStats, Metric::EnergyTotal, Energy::picojoules(3.58e6)),
        ];
        let normalized = normalizer.normalize(records);

        assert!((normalized[0].value() - 3.58e18).abs() / 3.58e18 < 1e-12);
        assert!(normalized[0].warnings.contains(&ScaleAmbiguityWarning::PrefixOffset {
            decades: 12,
            counterpart: Source::RawStats,
            counterpart_value_pj: 3.58e6,
        }));
        assert!(normalized[1]
            .warnings
            .iter()
            .any(|w| matches!(w, ScaleAmbiguityWarning::PrefixOffset { decades: -12, .. })));
    }

    #[test]
    fn test_no_warning_for_matching_or_drifting_values() {
        let normalizer = Normalizer::default();
        let records = vec![
            record(Source::ErtSummary, Metric::ErtWrite, Energy::picojoules(217.008)),
            record(Source::RawStats, Metric::VectorAccessEnergy, Energy::picojoules(268.0)),
        ];
        let normalized = normalizer.normalize(records);
        assert!(normalized.iter().all(|r| r.warnings.is_empty()));
    }

    #[test]
    fn test_same_source_pairs_are_not_flagged() {
        let normalizer = Normalizer::default();
        let records = vec![
            record(Source::RawStats, Metric::EnergyTotal, Energy::picojoules(1.0)),
            record(Source::RawStats, Metric::EnergyTotal, Energy::picojoules(1000.0)),
        ];
        let normalized = normalizer.normalize(records);
        assert!(normalized.iter().all(|r| r.warnings.is_empty()));
    }

    #[test]
    fn test_implausible_magnitude_but_zero_is_fine() {
        let normalizer = Normalizer::default();
        let records = vec![
            record(Source::RawStats, Metric::LeakageTotal, Energy::picojoules(0.0)),
            record(Source::ErtSummary, Metric::ErtRead, Energy::new(5.0, 12)),
        ];
        let normalized = normalizer.normalize(records);
        assert!(normalized[0].warnings.is_empty());
        assert!(matches!(
            normalized[1].warnings[0],
            ScaleAmbiguityWarning::ImplausibleMagnitude { .. }
        ));
    }

    #[test]
    fn test_normalize_twice_is_stable() {
        let normalizer = Normalizer::default();
        let records = vec![
            record(Source::DerivedSummary, Metric::PerComponentEnergy, Energy::joules(3.58e6)),
            record(Source::RawStats, Metric::EnergyTotal, Energy::picojoules(3.58e6)),
        ];
        let once = normalizer.normalize(records);
        let twice = normalizer.normalize(once.clone());
        assert_eq!(once, twice);
    }
}
