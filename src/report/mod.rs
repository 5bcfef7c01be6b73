// src/report/mod.rs
//! Discrepancy report
//!
//! Collects findings, scale warnings, uncompared keys, skipped checks and
//! parse failures of one run, and renders them as text, CSV or JSON.

use crate::reconcile::{Classification, DiscrepancyFinding, Reconciliation, SkippedCheck, Uncompared};
use crate::record::{EnergyRecord, Metric, ScaleAmbiguityWarning, Source};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scale warning attached to a normalized record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordWarning {
    pub source: Source,
    pub component_id: String,
    pub metric: Metric,
    pub value_pj: f64,
    pub origin: Option<String>,
    pub warning: ScaleAmbiguityWarning,
}

/// An artifact that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub source: Source,
    pub path: String,
    pub line: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub records: usize,
    pub findings: Vec<DiscrepancyFinding>,
    pub warnings: Vec<RecordWarning>,
    pub uncompared: Vec<Uncompared>,
    pub skipped: Vec<SkippedCheck>,
    pub parse_failures: Vec<ParseFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Csv,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("Unknown report format: {}", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Text => "text",
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        })
    }
}

impl ReconciliationReport {
    pub fn new(
        normalized: &[EnergyRecord],
        reconciliation: Reconciliation,
        mut parse_failures: Vec<ParseFailure>,
    ) -> Self {
        let mut warnings: Vec<RecordWarning> = normalized
            .iter()
            .flat_map(|record| {
                record.warnings.iter().map(move |warning| RecordWarning {
                    source: record.source,
                    component_id: record.component_id.clone(),
                    metric: record.metric,
                    value_pj: record.energy.to_picojoules().value,
                    origin: record.origin.as_ref().map(|o| o.to_string()),
                    warning: warning.clone(),
                })
            })
            .collect();
        warnings.sort_by(|a, b| {
            a.component_id
                .cmp(&b.component_id)
                .then(a.metric.cmp(&b.metric))
                .then(a.source.cmp(&b.source))
                .then(a.value_pj.total_cmp(&b.value_pj))
        });
        parse_failures.sort_by(|a, b| a.source.cmp(&b.source).then(a.path.cmp(&b.path)));

        Self {
            records: normalized.len(),
            findings: reconciliation.findings,
            warnings,
            uncompared: reconciliation.uncompared,
            skipped: reconciliation.skipped,
            parse_failures,
        }
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.findings
            .iter()
            .filter(|f| f.classification == classification)
            .count()
    }

    /// Any anomalous or configuration-mismatch finding
    pub fn has_failures(&self) -> bool {
        self.findings.iter().any(|f| f.classification.is_failure())
    }

    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, serde_json::Error> {
        match format {
            ReportFormat::Text => Ok(self.to_text()),
            ReportFormat::Csv => Ok(self.to_csv()),
            ReportFormat::Json => self.to_json(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "component_id,metric_class,kind,source_a,value_a_pj,source_b,value_b_pj,relative_delta,classification,warnings\n",
        );
        for f in &self.findings {
            let delta = f
                .relative_delta
                .map(|d| format!("{:.6}", d))
                .unwrap_or_default();
            let warnings: Vec<String> = f.warnings.iter().map(|w| w.to_string()).collect();
            out.push_str(&format!(
                "{},{},{},{},{:e},{},{:e},{},{},{}\n",
                csv_field(&f.component_id),
                f.metric_class,
                f.kind.label(),
                f.source_a,
                f.value_a.to_picojoules().value,
                f.source_b,
                f.value_b.to_picojoules().value,
                delta,
                f.classification,
                csv_field(&warnings.join("; "))
            ));
        }
        out
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Energy Reconciliation Report\n");
        out.push_str("============================\n");
        out.push_str(&format!(
            "Records: {}   Findings: {}\n",
            self.records,
            self.findings.len()
        ));
        out.push_str(&format!(
            "  consistent: {}  drift: {}  anomalous: {}  config_mismatch: {}\n",
            self.count(Classification::Consistent),
            self.count(Classification::Drift),
            self.count(Classification::Anomalous),
            self.count(Classification::ConfigMismatch)
        ));

        if !self.findings.is_empty() {
            let header = [
                "COMPONENT", "METRIC", "KIND", "SOURCE A", "A (pJ)", "SOURCE B", "B (pJ)", "DELTA", "RESULT",
            ];
            let rows: Vec<[String; 9]> = self
                .findings
                .iter()
                .map(|f| {
                    [
                        f.component_id.clone(),
                        f.metric_class.to_string(),
                        f.kind.label().to_string(),
                        f.source_a.to_string(),
                        format!("{:.4e}", f.value_a.to_picojoules().value),
                        f.source_b.to_string(),
                        format!("{:.4e}", f.value_b.to_picojoules().value),
                        f.relative_delta
                            .map(|d| format!("{:.2}%", d * 100.0))
                            .unwrap_or_else(|| "n/a".to_string()),
                        format!("{} {}", status_mark(f.classification), f.classification),
                    ]
                })
                .collect();

            let mut widths = header.map(|h| h.chars().count());
            for row in &rows {
                for (width, cell) in widths.iter_mut().zip(row) {
                    *width = (*width).max(cell.chars().count());
                }
            }

            out.push('\n');
            out.push_str(&table_line(&header.map(String::from), &widths));
            for row in &rows {
                out.push_str(&table_line(row, &widths));
            }
        }

        if !self.warnings.is_empty() {
            out.push_str("\nScale warnings:\n");
            for w in &self.warnings {
                let origin = w.origin.as_deref().map(|o| format!(" ({})", o)).unwrap_or_default();
                out.push_str(&format!(
                    "  ⚠ {} {} [{}]{}: {}\n",
                    w.component_id, w.metric, w.source, origin, w.warning
                ));
            }
        }

        if !self.uncompared.is_empty() {
            out.push_str("\nNot compared (single source):\n");
            for u in &self.uncompared {
                let sources: Vec<&str> = u.sources.iter().map(|s| s.label()).collect();
                out.push_str(&format!(
                    "  {} {} (only {})\n",
                    u.component_id,
                    u.metric_class,
                    sources.join(", ")
                ));
            }
        }

        if !self.skipped.is_empty() {
            out.push_str("\nSkipped derivation checks:\n");
            for s in &self.skipped {
                out.push_str(&format!("  {} [{}]: {}\n", s.component_id, s.source, s.reason));
            }
        }

        if !self.parse_failures.is_empty() {
            out.push_str("\nParse failures:\n");
            for p in &self.parse_failures {
                out.push_str(&format!("  ✗ {} {}: {}\n", p.source, p.path, p.message));
            }
        }

        out.push_str(&format!(
            "\nResult: {}\n",
            if self.has_failures() { "✗ FAIL" } else { "✓ PASS" }
        ));
        out
    }
}

fn status_mark(classification: Classification) -> &'static str {
    match classification {
        Classification::Consistent => "✓",
        Classification::Drift => "~",
        Classification::Anomalous | Classification::ConfigMismatch => "✗",
    }
}

fn table_line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
        .collect();
    format!("  {}\n", padded.join("  ").trim_end())
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{FindingKind, ReconcileContext, Reconciler};
    use crate::record::{Energy, MetricClass};

    fn finding(component: &str, delta: Option<f64>, classification: Classification) -> DiscrepancyFinding {
        DiscrepancyFinding {
            component_id: component.to_string(),
            metric_class: MetricClass::AccessEnergy,
            kind: FindingKind::CrossSource,
            source_a: Source::RawStats,
            value_a: Energy::picojoules(268.0),
            source_b: Source::ErtSummary,
            value_b: Energy::picojoules(217.008),
            relative_delta: delta,
            classification,
            warnings: Vec::new(),
        }
    }

    fn report(findings: Vec<DiscrepancyFinding>) -> ReconciliationReport {
        ReconciliationReport::new(
            &[],
            Reconciliation {
                findings,
                ..Reconciliation::default()
            },
            Vec::new(),
        )
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(report(vec![]).exit_code(), 0);
        assert_eq!(report(vec![finding("a", Some(0.19), Classification::Drift)]).exit_code(), 0);
        assert_eq!(report(vec![finding("a", Some(0.9), Classification::Anomalous)]).exit_code(), 1);
        assert_eq!(report(vec![finding("a", None, Classification::ConfigMismatch)]).exit_code(), 1);
    }

    #[test]
    fn test_parse_failures_alone_do_not_fail() {
        let report = ReconciliationReport::new(
            &[],
            Reconciliation::default(),
            vec![ParseFailure {
                source: Source::RawStats,
                path: "stats.txt".to_string(),
                line: Some(3),
                message: "stats.txt:3: invalid number `x`".to_string(),
            }],
        );
        assert_eq!(report.exit_code(), 0);
        assert!(report.to_text().contains("Parse failures"));
    }

    #[test]
    fn test_csv_rendering() {
        let csv = report(vec![
            finding("main_memory", Some(0.190269), Classification::Drift),
            finding("odd,name", None, Classification::ConfigMismatch),
        ])
        .to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("component_id,metric_class"));
        assert!(lines[1].starts_with("main_memory,access_energy,cross_source,raw_stats,2.68e2,"));
        assert!(lines[1].contains(",0.190269,drift,"));
        assert!(lines[2].starts_with("\"odd,name\","));
        assert!(lines[2].contains(",,config_mismatch,"));
    }

    #[test]
    fn test_text_rendering() {
        let text = report(vec![finding("main_memory", Some(0.19), Classification::Drift)]).to_text();
        assert!(text.contains("drift: 1"));
        assert!(text.contains("main_memory"));
        assert!(text.contains("19.00%"));
        assert!(text.contains("✓ PASS"));
    }

    #[test]
    fn test_json_rendering_round_trips() {
        let records = vec![
            EnergyRecord::new(Source::RawStats, "a", Metric::EnergyTotal, Energy::picojoules(1.0)),
            EnergyRecord::new(Source::DerivedSummary, "a", Metric::PerComponentEnergy, Energy::picojoules(2.0)),
        ];
        let reconciliation = Reconciler::default().reconcile(&records, &ReconcileContext::default());
        let report = ReconciliationReport::new(&records, reconciliation, Vec::new());

        let json = report.render(ReportFormat::Json).unwrap();
        let parsed: ReconciliationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
        assert!(json.contains("\"classification\": \"anomalous\""));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ReportFormat>(), Ok(ReportFormat::Csv));
        assert_eq!("json".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
