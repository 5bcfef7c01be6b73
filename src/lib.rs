pub mod config;
pub mod record;
pub mod parsers;
pub mod normalize;
pub mod cooling;
pub mod reconcile;
pub mod report;
pub mod pipeline;

pub use config::{ArtifactConfig, ReconcileConfig};
pub use pipeline::Pipeline;
pub use report::{ReconciliationReport, ReportFormat};
