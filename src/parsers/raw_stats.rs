// src/parsers/raw_stats.rs
//! Parser for the simulator's raw per-component stats report
//!
//! Components are introduced by `=== name ===` headers; energy lines are
//! `label : value [unit]` with labels matched case- and space-insensitively.

use super::{parse_quantity, IngestOptions, ParseError, ParsedReport, ReportContext, ReportParser};
use crate::record::{canonical_component_id, Metric, Source};

pub struct RawStatsParser;

/// Recognized stats labels, compared after lowercasing and removing spaces
fn metric_for_label(label: &str) -> Option<Metric> {
    let key: String = label
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    match key.as_str() {
        "energy(per-instance-cycle-leakage)" | "leakage(per-instance-cycle)" => {
            Some(Metric::LeakagePerInstanceCycle)
        }
        "energy(total-leakage)" | "leakage(total)" | "leakageenergy(total)" => {
            Some(Metric::LeakageTotal)
        }
        "vectoraccessenergy" => Some(Metric::VectorAccessEnergy),
        "energy(per-scalar-access)" => Some(Metric::EnergyPerScalarAccess),
        "energy(per-instance)" => Some(Metric::EnergyPerInstance),
        "energy(total)" => Some(Metric::EnergyTotal),
        _ => None,
    }
}

fn section_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix("===")?.strip_suffix("===")?.trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

impl ReportParser for RawStatsParser {
    fn source(&self) -> Source {
        Source::RawStats
    }

    fn parse(&self, text: &str, options: &IngestOptions) -> Result<ParsedReport, ParseError> {
        let default_exponent = self.source().native_unit_exponent();
        let mut records = Vec::new();
        let mut current: Option<String> = None;
        let mut sections = 0usize;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(name) = section_header(line) {
                current = Some(canonical_component_id(name));
                sections += 1;
                continue;
            }

            let Some((label, rest)) = line.split_once(':') else {
                continue;
            };
            let Some(metric) = metric_for_label(label) else {
                continue;
            };

            let component = current.as_deref().ok_or_else(|| {
                ParseError::malformed(
                    options,
                    line_no,
                    format!("`{}` appears before any component section", label.trim()),
                )
            })?;

            let energy = parse_quantity(rest, default_exponent)
                .map_err(|msg| ParseError::malformed(options, line_no, msg))?;

            records.push(options.record(self.source(), component, metric, energy, Some(line_no)));
        }

        if sections == 0 {
            return Err(ParseError::missing(options, "component section (=== name ===)"));
        }

        log::debug!(
            "Parsed {} records from {} component sections in {}",
            records.len(),
            sections,
            options.display_path()
        );

        Ok(ParsedReport {
            source: self.source(),
            path: options.path.clone(),
            records,
            context: ReportContext::default(),
        })
    }
}
