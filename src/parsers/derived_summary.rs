// src/parsers/derived_summary.rs
//! Parser for the derived summary document
//!
//! The summary is JSON exposing `per_component_energy` (required) and
//! `per_compute_energy` maps keyed by component, plus optional run context.
//! Values are joules unless the document sets `unit_exponent`.

use super::{IngestOptions, ParseError, ParsedReport, ReportContext, ReportParser};
use crate::record::{canonical_component_id, Energy, Metric, Source};
use serde::Deserialize;
use std::collections::BTreeMap;

pub struct DerivedSummaryParser;

#[derive(Debug, Deserialize)]
struct SummaryDocument {
    per_component_energy: Option<BTreeMap<String, Option<f64>>>,
    #[serde(default)]
    per_compute_energy: Option<BTreeMap<String, Option<f64>>>,
    #[serde(default)]
    computes: Option<u64>,
    #[serde(default)]
    cycles: Option<u64>,
    #[serde(default)]
    cycle_seconds: Option<f64>,
    #[serde(default)]
    unit_exponent: Option<i32>,
}

impl ReportParser for DerivedSummaryParser {
    fn source(&self) -> Source {
        Source::DerivedSummary
    }

    fn parse(&self, text: &str, options: &IngestOptions) -> Result<ParsedReport, ParseError> {
        let document: SummaryDocument =
            serde_json::from_str(text).map_err(|e| ParseError::Document {
                path: options.display_path(),
                line: e.line(),
                column: e.column(),
                message: e.to_string(),
            })?;

        let per_component = document
            .per_component_energy
            .ok_or_else(|| ParseError::missing(options, "per_component_energy"))?;
        let exponent = document
            .unit_exponent
            .unwrap_or_else(|| self.source().native_unit_exponent());

        let mut records = Vec::new();
        let sections = [
            (Metric::PerComponentEnergy, Some(per_component)),
            (Metric::PerComputeEnergy, document.per_compute_energy),
        ];
        for (metric, entries) in sections {
            for (name, value) in entries.into_iter().flatten() {
                // null is "not measured"
                let Some(value) = value else {
                    log::debug!("{}: {} has no {} value", options.display_path(), name, metric);
                    continue;
                };
                let component = canonical_component_id(&name);
                records.push(options.record(
                    self.source(),
                    &component,
                    metric,
                    Energy::new(value, exponent),
                    None,
                ));
            }
        }

        Ok(ParsedReport {
            source: self.source(),
            path: options.path.clone(),
            records,
            context: ReportContext {
                computes: document.computes,
                cycles: document.cycles,
                cycle_seconds: document.cycle_seconds,
            },
        })
    }
}
