// src/parsers/mod.rs
//! Report parsers
//!
//! One parser per input format. Each turns the raw text of an artifact into
//! energy records tagged with their source-native scale. A metric that is
//! absent from an artifact yields no record, so "not measured" stays
//! distinguishable from "measured as zero".

pub mod derived_summary;
pub mod ert_summary;
pub mod raw_stats;

pub use derived_summary::DerivedSummaryParser;
pub use ert_summary::ErtSummaryParser;
pub use raw_stats::RawStatsParser;

use crate::record::{canonical_component_id, unit_exponent, Energy, EnergyRecord, Metric, Origin, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Per-artifact ingestion settings
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Components the producing run excluded from DRAM coalescing
    pub no_coalesce: BTreeSet<String>,
    pub path: Option<PathBuf>,
}

impl IngestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_no_coalesce<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.no_coalesce.extend(components.into_iter().map(|c| {
            let name: String = c.into();
            canonical_component_id(&name)
        }));
        self
    }

    /// Accepts either the short or the hierarchical component name
    pub fn is_coalesce_excluded(&self, component_id: &str) -> bool {
        self.no_coalesce.contains(&canonical_component_id(component_id))
    }

    /// no-coalesce entries that name no component in `records`
    pub fn unmatched_no_coalesce(&self, records: &[EnergyRecord]) -> Vec<String> {
        self.no_coalesce
            .iter()
            .filter(|name| !records.iter().any(|r| &r.component_id == *name))
            .cloned()
            .collect()
    }

    pub fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<input>".to_string())
    }

    fn origin(&self, line: Option<usize>) -> Origin {
        Origin {
            path: self.path.clone(),
            line,
        }
    }

    /// Build a record with coalescing flag and origin filled in
    pub(crate) fn record(
        &self,
        source: Source,
        component_id: &str,
        metric: Metric,
        energy: Energy,
        line: Option<usize>,
    ) -> EnergyRecord {
        EnergyRecord::new(source, component_id, metric, energy)
            .with_coalesce_excluded(self.is_coalesce_excluded(component_id))
            .with_origin(self.origin(line))
    }
}

/// Run-level figures some reports expose alongside their energies
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportContext {
    pub computes: Option<u64>,
    pub cycles: Option<u64>,
    pub cycle_seconds: Option<f64>,
}

impl ReportContext {
    /// Wall-clock runtime of the modeled workload, when known
    pub fn runtime_seconds(&self) -> Option<f64> {
        match (self.cycles, self.cycle_seconds) {
            (Some(cycles), Some(seconds)) if cycles > 0 && seconds > 0.0 => {
                Some(cycles as f64 * seconds)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReport {
    pub source: Source,
    pub path: Option<PathBuf>,
    pub records: Vec<EnergyRecord>,
    pub context: ReportContext,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{path}: cannot read artifact: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Malformed {
        path: String,
        line: usize,
        message: String,
    },

    #[error("{path}: missing required field `{field}`")]
    MissingField { path: String, field: String },

    #[error("{path}:{line}:{column}: invalid summary document: {message}")]
    Document {
        path: String,
        line: usize,
        column: usize,
        message: String,
    },
}

impl ParseError {
    pub(crate) fn malformed(options: &IngestOptions, line: usize, message: impl Into<String>) -> Self {
        ParseError::Malformed {
            path: options.display_path(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn missing(options: &IngestOptions, field: impl Into<String>) -> Self {
        ParseError::MissingField {
            path: options.display_path(),
            field: field.into(),
        }
    }

    /// Line the error points at, if it has one
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Malformed { line, .. } | ParseError::Document { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub trait ReportParser {
    fn source(&self) -> Source;

    fn parse(&self, text: &str, options: &IngestOptions) -> Result<ParsedReport, ParseError>;
}

pub fn parser_for(source: Source) -> Box<dyn ReportParser + Send + Sync> {
    match source {
        Source::RawStats => Box::new(RawStatsParser),
        Source::ErtSummary => Box::new(ErtSummaryParser),
        Source::DerivedSummary => Box::new(DerivedSummaryParser),
    }
}

/// Read an artifact fully and parse it with the parser for `source`
pub fn parse_file<P: AsRef<Path>>(
    source: Source,
    path: P,
    options: IngestOptions,
) -> Result<ParsedReport, ParseError> {
    let path = path.as_ref();
    let options = options.with_path(path);
    let text = std::fs::read_to_string(path).map_err(|e| ParseError::Io {
        path: options.display_path(),
        source: e,
    })?;
    log::debug!("Read {} bytes from {} ({})", text.len(), path.display(), source);
    parser_for(source).parse(&text, &options)
}

/// Parse `<number> [unit]`, falling back to `default_exponent` without a unit
pub(crate) fn parse_quantity(text: &str, default_exponent: i32) -> Result<Energy, String> {
    let mut parts = text.split_whitespace();
    let number = parts.next().ok_or_else(|| "missing value".to_string())?;
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid number `{}`", number))?;
    let exponent = match parts.next() {
        None => default_exponent,
        Some(unit) => unit_exponent(unit).ok_or_else(|| format!("unknown unit `{}`", unit))?,
    };
    if let Some(extra) = parts.next() {
        return Err(format!("unexpected `{}` after value", extra));
    }
    Ok(Energy::new(value, exponent))
}

/// Cells that mean the metric was not measured
pub(crate) fn is_unmeasured(cell: &str) -> bool {
    matches!(
        cell.trim().to_ascii_lowercase().as_str(),
        "" | "-" | "n/a" | "na" | "none" | "null"
    )
}
