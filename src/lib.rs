//! # Sample Processor Library
//!
//! The result-processing core of a load-testing tool. It turns a stream of
//! test-execution records ("samples") into aggregated statistics and can sort
//! record sets larger than memory before they are processed.
//!
//! ## Architecture Overview
//!
//! The library is organized into several key modules:
//!
//! - `sample`: sample records, their schema and the standard result-file columns
//! - `pipeline`: the producer/consumer protocol, run context and driver stages
//! - `aggregator`: streaming aggregators (mean, P² percentile, sum, min, max)
//! - `summary`: per-label summaries (requests, errors, statistics, Apdex, top errors)
//! - `sorter`: the external merge sorter with bounded memory
//! - `result_tree`: the `List`/`Map`/`Value` tree summaries export
//! - `io`: record readers and writers (CSV result files, chunk files)
//! - `report`: JSON report assembly
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use sample_processor::io::CsvSampleReader;
//! use sample_processor::pipeline::{SampleContext, SampleSource};
//! use sample_processor::summary::{StatisticsSummary, SummaryConsumer};
//!
//! fn main() -> anyhow::Result<()> {
//!     let reader = CsvSampleReader::open("results.jtl", ',')?;
//!
//!     let mut source = SampleSource::new(SampleContext::new(std::env::temp_dir()));
//!     source.add_channel(Box::new(reader), None);
//!     source.add_consumer(Box::new(SummaryConsumer::new(
//!         "statistics",
//!         StatisticsSummary::new()?,
//!     )));
//!     source.run()?;
//!
//!     let statistics = source.context().get_data("statistics_summary");
//!     println!("{:?}", statistics);
//!     Ok(())
//! }
//! ```
//!
//! ## Resource Characteristics
//!
//! - **Constant memory** per label for every summary, percentiles included
//! - **Bounded memory** sorting: at most one chunk of samples is held at a time
//! - **Fork-join parallelism** on a private rayon pool, confined to the sorter

/// Aggregators and aggregator factories
pub mod aggregator;

/// Command-line interface and configuration
///
/// Converts user-facing options into pipeline, sorter and summary
/// configuration. Includes argument validation and default values.
pub mod cli;

pub mod error;

/// Record readers and writers
pub mod io;

pub mod logging;

/// Sample pipeline framework
///
/// Contains the consumer/producer traits, the shared run context and the
/// stages that are not summaries: the source driver, filters, aggregates and
/// writers.
pub mod pipeline;

/// JSON report output
///
/// Collects stage results from the run context with run metadata for
/// reproducibility.
pub mod report;

pub mod result_tree;

pub mod sample;

/// External merge sorter
///
/// Bounded-memory sorting with in-memory parallel merge sort, chunk spilling
/// and a binary merge tree over chunk files.
pub mod sorter;

/// Summary consumers
///
/// Per-label and overall aggregates exported as result trees.
pub mod summary;

// Re-export key types for convenient library usage

pub use error::{ProcessorError, Result};

/// Pipeline building blocks
pub use pipeline::{SampleConsumer, SampleContext, SampleProducer, SampleSource};

pub use result_tree::{ResultData, ResultDataVisitor, ResultValue};

pub use sample::{Sample, SampleBuilder, SampleMetadata};

pub use sorter::{ExternalSampleSorter, SorterConfig};

/// The current version of the sample processor
///
/// Populated from Cargo.toml and written into every report.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// Sensible defaults for every configurable parameter of the processing
/// core and the command-line driver.
pub mod defaults {
    /// Default number of samples held in memory before the sorter spills
    ///
    /// 50,000 samples keeps a chunk within a few tens of megabytes for
    /// typical result files while producing few enough chunk files that the
    /// merge tree stays shallow.
    pub const CHUNK_SIZE: usize = 50_000;

    /// Smallest chunk size the sorter accepts; smaller requests are raised
    pub const MIN_CHUNK_SIZE: usize = 50_000;

    /// Percentiles reported by the statistics summary
    pub const PERCENTILES: [f64; 3] = [90.0, 95.0, 99.0];

    /// Apdex satisfied threshold in milliseconds
    pub const APDEX_SATISFIED_MS: u64 = 500;

    /// Apdex tolerated threshold in milliseconds
    pub const APDEX_TOLERATED_MS: u64 = 1500;

    /// Number of errors listed per label by the top errors summary
    pub const TOP_ERRORS: usize = 5;

    /// Field separator of result files
    pub const SEPARATOR: char = ',';

    /// Default report file name
    pub const OUTPUT_FILE: &str = "report.json";
}
