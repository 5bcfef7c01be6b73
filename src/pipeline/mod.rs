// src/pipeline/mod.rs
//! Batch reconciliation pipeline
//!
//! parse (in parallel) → strip cooling overhead → normalize → reconcile.
//! A failed artifact is recorded in the report and the rest carry on.

use crate::config::{ArtifactConfig, ReconcileConfig};
use crate::cooling::CoolingModel;
use crate::normalize::Normalizer;
use crate::parsers::{parse_file, IngestOptions, ParsedReport, ReportContext};
use crate::reconcile::{ReconcileContext, Reconciler};
use crate::report::{ParseFailure, ReconciliationReport};
use crate::record::Source;
use rayon::prelude::*;

pub struct Pipeline {
    config: ReconcileConfig,
}

impl Pipeline {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconcile the artifacts listed in the configuration
    pub fn run(&self) -> ReconciliationReport {
        self.run_artifacts(&self.config.artifacts)
    }

    pub fn run_artifacts(&self, artifacts: &[ArtifactConfig]) -> ReconciliationReport {
        log::info!("Parsing {} artifacts", artifacts.len());

        let outcomes: Vec<_> = artifacts
            .par_iter()
            .map(|artifact| {
                let options = IngestOptions::new().with_no_coalesce(artifact.no_coalesce.iter().cloned());
                (artifact, parse_file(artifact.source, &artifact.path, options))
            })
            .collect();

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for (artifact, outcome) in outcomes {
            match outcome {
                Ok(report) => {
                    let options = IngestOptions::new().with_no_coalesce(artifact.no_coalesce.iter().cloned());
                    for name in options.unmatched_no_coalesce(&report.records) {
                        log::warn!(
                            "{}: no-coalesce component `{}` does not appear in {}",
                            artifact.source,
                            name,
                            artifact.path.display()
                        );
                    }
                    log::info!(
                        "{}: {} records from {}",
                        artifact.source,
                        report.records.len(),
                        artifact.path.display()
                    );
                    reports.push(report);
                }
                Err(e) => {
                    log::error!("{}", e);
                    failures.push(ParseFailure {
                        source: artifact.source,
                        path: artifact.path.display().to_string(),
                        line: e.line(),
                        message: e.to_string(),
                    });
                }
            }
        }

        self.reconcile_reports(reports, failures)
    }

    /// Run every stage after parsing on already-parsed reports
    pub fn reconcile_reports(
        &self,
        reports: Vec<ParsedReport>,
        parse_failures: Vec<ParseFailure>,
    ) -> ReconciliationReport {
        let run_context = summary_context(&reports);
        let computes = self.config.computes.or_else(|| reports.iter().find_map(|r| r.context.computes));

        let mut records: Vec<_> = reports.into_iter().flat_map(|r| r.records).collect();

        if self.config.cooling.enabled {
            records = CoolingModel::new(&self.config.cooling).strip_overhead(records, &run_context);
        }

        let normalized = Normalizer::new(self.config.scale.clone()).normalize(records);
        let reconciliation = Reconciler::new(self.config.tolerance)
            .reconcile(&normalized, &ReconcileContext { computes });

        ReconciliationReport::new(&normalized, reconciliation, parse_failures)
    }
}

/// Cooling needs the derived summary's runtime figures
fn summary_context(reports: &[ParsedReport]) -> ReportContext {
    reports
        .iter()
        .find(|r| r.source == Source::DerivedSummary)
        .map(|r| r.context)
        .unwrap_or_default()
}
