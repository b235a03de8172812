//! JSON report assembly
//!
//! Summary and aggregate stages leave their results in the run context.
//! [`ReportBuilder`] collects the entries of the stages it is told about and
//! writes them, with run metadata, as one pretty-printed JSON document.

use crate::error::{ProcessorError, Result};
use crate::pipeline::aggregate::AGGREGATE_KEY;
use crate::pipeline::SampleContext;
use crate::result_tree::JsonConverter;
use crate::summary::SUMMARY_KEY;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Complete report of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Stage name to exported result tree
    pub results: BTreeMap<String, serde_json::Value>,
}

/// Run metadata for reproducibility
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub version: String,
    pub run_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub total_samples: u64,
    pub sources: Vec<String>,
    pub system_info: SystemInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
        }
    }
}

/// Collects stage results from a run context into a [`Report`]
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    run_id: Uuid,
    stages: Vec<String>,
    sources: Vec<String>,
    total_samples: u64,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stages: Vec::new(),
            sources: Vec::new(),
            total_samples: 0,
        }
    }

    /// Include the results stored by the stage called `name`
    pub fn stage(mut self, name: impl Into<String>) -> Self {
        self.stages.push(name.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn total_samples(mut self, samples: u64) -> Self {
        self.total_samples = samples;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Look up every registered stage in `context`.
    ///
    /// A stage's summary entry takes precedence over its aggregate entry;
    /// stages that stored neither are skipped with a warning.
    pub fn build(&self, context: &SampleContext) -> Report {
        let mut results = BTreeMap::new();
        for stage in &self.stages {
            let data = [SUMMARY_KEY, AGGREGATE_KEY]
                .iter()
                .find_map(|suffix| context.get_data(&format!("{}{}", stage, suffix)));
            match data {
                Some(data) => {
                    results.insert(stage.clone(), data.accept(&mut JsonConverter));
                }
                None => warn!(stage = %stage, "no result stored for stage"),
            }
        }

        Report {
            metadata: ReportMetadata {
                version: crate::VERSION.to_string(),
                run_id: self.run_id.to_string(),
                timestamp: chrono::Utc::now(),
                total_samples: self.total_samples,
                sources: self.sources.clone(),
                system_info: SystemInfo::current(),
            },
            results,
        }
    }

    /// Build the report and write it to `path`
    pub fn write(&self, context: &SampleContext, path: &Path) -> Result<Report> {
        let report = self.build(context);
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).map_err(|e| ProcessorError::resource(path, e))?;
        info!(path = %path.display(), stages = report.results.len(), "report written");
        Ok(report)
    }
}
