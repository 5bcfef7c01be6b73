// src/cooling/mod.rs
//! Cryogenic cooling overhead
//!
//! The summary pipeline multiplies the energy of cold components by the wall
//! power its cryocooler needs to lift that heat back to room temperature.
//! Raw stats and the reference table never include this overhead, so it has
//! to be divided back out of the summary before the sources are comparable.
//!
//! Stage rules (SHI RDE-418D4 two-stage cooler):
//! - T < 10 K sits on the 4 K stage: ×`second_stage_factor`
//! - 10 K < T < 80 K sits on the ~70 K stage: ×`first_stage_factor`, except
//!   that with a 4 K stage running the first stage absorbs up to
//!   `first_stage_free_watts` for free
//! - anything else is treated as room temperature

use crate::config::CoolingConfig;
use crate::parsers::ReportContext;
use crate::record::{canonical_component_id, EnergyRecord, Metric, Source};
use std::collections::{BTreeMap, BTreeSet};

pub const ROOM_TEMPERATURE_K: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoolingStage {
    /// ~70 K stage
    First,
    /// 4 K stage
    Second,
}

impl CoolingStage {
    pub fn for_temperature(kelvin: f64) -> Option<Self> {
        if kelvin < 10.0 {
            Some(CoolingStage::Second)
        } else if kelvin > 10.0 && kelvin < 80.0 {
            Some(CoolingStage::First)
        } else {
            None
        }
    }
}

pub struct CoolingModel<'a> {
    config: &'a CoolingConfig,
}

impl<'a> CoolingModel<'a> {
    pub fn new(config: &'a CoolingConfig) -> Self {
        Self { config }
    }

    /// Configured temperature; keys may use the short or hierarchical name
    pub fn temperature(&self, component_id: &str) -> f64 {
        let component = canonical_component_id(component_id);
        self.config
            .temperatures
            .iter()
            .find(|(name, _)| canonical_component_id(name) == component)
            .map(|(_, &kelvin)| kelvin)
            .unwrap_or(ROOM_TEMPERATURE_K)
    }

    /// Overhead factor the summary applied to each listed component.
    ///
    /// `energies_pj` holds the cooled per-component energies; they are only
    /// needed for the first-stage free-capacity rule.
    pub fn overhead_factors(
        &self,
        energies_pj: &BTreeMap<String, f64>,
        components: &BTreeSet<String>,
        context: &ReportContext,
    ) -> BTreeMap<String, f64> {
        let has_4k_stage = components
            .iter()
            .any(|c| CoolingStage::for_temperature(self.temperature(c)) == Some(CoolingStage::Second));
        let runtime = context.runtime_seconds();

        let mut factors = BTreeMap::new();
        for component in components {
            let factor = match CoolingStage::for_temperature(self.temperature(component)) {
                None => continue,
                Some(CoolingStage::Second) => self.config.second_stage_factor,
                Some(CoolingStage::First) if !has_4k_stage => self.config.first_stage_factor,
                Some(CoolingStage::First) => {
                    match (energies_pj.get(component), runtime) {
                        (Some(&energy_pj), Some(seconds)) => {
                            // Cooled values below the free capacity were never multiplied
                            let watts = energy_pj * 1e-12 / seconds;
                            if watts < self.config.first_stage_free_watts {
                                log::debug!(
                                    "{}: {:.3} W fits in the free first-stage capacity",
                                    component, watts
                                );
                                continue;
                            }
                            self.config.first_stage_factor
                        }
                        _ => {
                            log::warn!(
                                "{}: cannot tell whether first-stage overhead was applied \
                                 (runtime or per-component energy unknown); assuming it was",
                                component
                            );
                            self.config.first_stage_factor
                        }
                    }
                }
            };
            factors.insert(component.clone(), factor);
        }
        factors
    }

    /// Divide the cooling overhead out of derived-summary energies
    pub fn strip_overhead(&self, records: Vec<EnergyRecord>, context: &ReportContext) -> Vec<EnergyRecord> {
        let is_cooled = |r: &EnergyRecord| {
            r.source == Source::DerivedSummary
                && matches!(r.metric, Metric::PerComponentEnergy | Metric::PerComputeEnergy)
        };

        let components: BTreeSet<String> = records
            .iter()
            .filter(|r| is_cooled(r))
            .map(|r| r.component_id.clone())
            .collect();
        let energies_pj: BTreeMap<String, f64> = records
            .iter()
            .filter(|r| r.source == Source::DerivedSummary && r.metric == Metric::PerComponentEnergy)
            .map(|r| (r.component_id.clone(), r.energy.to_picojoules().value))
            .collect();

        let factors = self.overhead_factors(&energies_pj, &components, context);

        records
            .into_iter()
            .map(|mut record| {
                if !is_cooled(&record) {
                    return record;
                }
                if let Some(&factor) = factors.get(&record.component_id) {
                    log::info!(
                        "Removed {}x cooling overhead from {} {}",
                        factor, record.component_id, record.metric
                    );
                    record.energy.value /= factor;
                }
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Energy;

    fn config(temps: &[(&str, f64)]) -> CoolingConfig {
        let mut config = CoolingConfig {
            enabled: true,
            ..CoolingConfig::default()
        };
        for (name, kelvin) in temps {
            config.temperatures.insert(name.to_string(), *kelvin);
        }
        config
    }

    fn summary(component: &str, metric: Metric, pj: f64) -> EnergyRecord {
        EnergyRecord::new(Source::DerivedSummary, component, metric, Energy::picojoules(pj))
    }

    #[test]
    fn test_stage_boundaries() {
        assert_eq!(CoolingStage::for_temperature(4.0), Some(CoolingStage::Second));
        assert_eq!(CoolingStage::for_temperature(10.0), None);
        assert_eq!(CoolingStage::for_temperature(70.0), Some(CoolingStage::First));
        assert_eq!(CoolingStage::for_temperature(77.0), Some(CoolingStage::First));
        assert_eq!(CoolingStage::for_temperature(300.0), None);
    }

    #[test]
    fn test_second_stage_overhead_removed() {
        let config = config(&[("cryocable", 4.0)]);
        let records = vec![
            summary("cryocable", Metric::PerComponentEnergy, 5000.0),
            summary("cryocable", Metric::PerComputeEnergy, 5.0),
            summary("main_memory", Metric::PerComponentEnergy, 10.0),
            EnergyRecord::new(Source::RawStats, "cryocable", Metric::EnergyTotal, Energy::picojoules(5.0)),
        ];
        let stripped = CoolingModel::new(&config).strip_overhead(records, &ReportContext::default());

        assert_eq!(stripped[0].value(), 5.0);
        assert_eq!(stripped[1].value(), 0.005);
        assert_eq!(stripped[2].value(), 10.0);
        assert_eq!(stripped[3].value(), 5.0);
    }

    #[test]
    fn test_first_stage_free_capacity_with_4k_stage() {
        let config = config(&[("cryocable", 4.0), ("cold2hot", 70.0), ("amplifier", 70.0)]);
        let context = ReportContext {
            computes: None,
            cycles: Some(1_000_000),
            cycle_seconds: Some(1e-9),
        };
        // runtime 1 ms: 1e10 pJ = 10 mJ -> 10 W, below 80 W
        let records = vec![
            summary("cryocable", Metric::PerComponentEnergy, 1000.0),
            summary("cold2hot", Metric::PerComponentEnergy, 1e10),
            summary("amplifier", Metric::PerComponentEnergy, 9.375e15),
        ];
        let stripped = CoolingModel::new(&config).strip_overhead(records, &context);

        assert_eq!(stripped[0].value(), 1.0);
        assert_eq!(stripped[1].value(), 1e10);
        assert!((stripped[2].value() - 1e14).abs() < 1.0);
    }

    #[test]
    fn test_hierarchical_temperature_keys() {
        let config = config(&[("system_top_level.cryocable", 4.0), ("chip.cold2hot[0..3]", 70.0)]);
        let model = CoolingModel::new(&config);
        assert_eq!(model.temperature("cryocable"), 4.0);
        assert_eq!(model.temperature("cold2hot"), 70.0);
        assert_eq!(model.temperature("main_memory"), ROOM_TEMPERATURE_K);

        let records = vec![summary("cryocable", Metric::PerComponentEnergy, 5000.0)];
        let stripped = model.strip_overhead(records, &ReportContext::default());
        assert_eq!(stripped[0].value(), 5.0);
    }

    #[test]
    fn test_first_stage_without_4k_stage_always_applies() {
        let config = config(&[("cold2hot", 70.0)]);
        let records = vec![summary("cold2hot", Metric::PerComponentEnergy, 93.75)];
        let stripped = CoolingModel::new(&config).strip_overhead(records, &ReportContext::default());
        assert_eq!(stripped[0].value(), 1.0);
    }
}
