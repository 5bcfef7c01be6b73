// src/parsers/ert_summary.rs
//! Parser for the reference energy table (ERT) summary
//!
//! A header row names the columns (`component` followed by any of `read`,
//! `write`, `update`, `leak`); each data row gives one component's per-action
//! energies. Cells may be separated by whitespace, `|` or `,`. An optional
//! `unit = <unit>` directive changes the table unit from pJ.

use super::{is_unmeasured, IngestOptions, ParseError, ParsedReport, ReportContext, ReportParser};
use crate::record::{canonical_component_id, unit_exponent, Energy, Metric, Source};

pub struct ErtSummaryParser;

fn column_metric(name: &str) -> Option<Metric> {
    match name.trim().to_ascii_lowercase().as_str() {
        "read" => Some(Metric::ErtRead),
        "write" => Some(Metric::ErtWrite),
        "update" => Some(Metric::ErtUpdate),
        "leak" | "leakage" => Some(Metric::LeakagePerInstanceCycle),
        _ => None,
    }
}

fn split_cells(line: &str) -> Vec<&str> {
    if line.contains('|') {
        line.trim_matches('|').split('|').map(str::trim).collect()
    } else if line.contains(',') {
        line.split(',').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    }
}

fn unit_directive(line: &str) -> Option<&str> {
    let (key, value) = line.split_once(|c: char| c == '=' || c == ':')?;
    if key.trim().eq_ignore_ascii_case("unit") {
        Some(value.trim())
    } else {
        None
    }
}

fn parse_header(cells: &[&str], options: &IngestOptions, line_no: usize) -> Result<Vec<Metric>, ParseError> {
    let first = cells.first().map(|c| c.to_ascii_lowercase());
    if !matches!(first.as_deref(), Some("component") | Some("name")) {
        return Err(ParseError::malformed(
            options,
            line_no,
            "expected header row starting with `component`",
        ));
    }
    cells[1..]
        .iter()
        .map(|cell| {
            column_metric(cell).ok_or_else(|| {
                ParseError::malformed(options, line_no, format!("unknown column `{}`", cell))
            })
        })
        .collect()
}

impl ReportParser for ErtSummaryParser {
    fn source(&self) -> Source {
        Source::ErtSummary
    }

    fn parse(&self, text: &str, options: &IngestOptions) -> Result<ParsedReport, ParseError> {
        let mut exponent = self.source().native_unit_exponent();
        let mut columns: Option<Vec<Metric>> = None;
        let mut records = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(unit) = unit_directive(line) {
                exponent = unit_exponent(unit).ok_or_else(|| {
                    ParseError::malformed(options, line_no, format!("unknown unit `{}`", unit))
                })?;
                continue;
            }

            // Separator rows of a markdown-style table
            if line.chars().all(|c| matches!(c, '-' | '|' | ':' | '+' | ' ')) {
                continue;
            }

            let cells = split_cells(line);

            let metrics = match &columns {
                Some(metrics) => metrics,
                None => {
                    columns = Some(parse_header(&cells, options, line_no)?);
                    continue;
                }
            };

            if cells.len() != metrics.len() + 1 {
                return Err(ParseError::malformed(
                    options,
                    line_no,
                    format!("expected {} cells, found {}", metrics.len() + 1, cells.len()),
                ));
            }

            let component = canonical_component_id(cells[0]);
            for (metric, cell) in metrics.iter().zip(&cells[1..]) {
                if is_unmeasured(cell) {
                    continue;
                }
                let value: f64 = cell.parse().map_err(|_| {
                    ParseError::malformed(options, line_no, format!("invalid number `{}`", cell))
                })?;
                records.push(options.record(
                    self.source(),
                    &component,
                    *metric,
                    Energy::new(value, exponent),
                    Some(line_no),
                ));
            }
        }

        if columns.is_none() {
            return Err(ParseError::missing(options, "header row"));
        }

        log::debug!("Parsed {} ERT entries from {}", records.len(), options.display_path());

        Ok(ParsedReport {
            source: self.source(),
            path: options.path.clone(),
            records,
            context: ReportContext::default(),
        })
    }
}
