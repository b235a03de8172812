//! # Sample Processor - Main Entry Point
//!
//! Reads one or more load-test result files, optionally sorts them with the
//! external sorter, runs every summary over the stream and writes a JSON
//! report.
//!
//! ## Pipeline Layout
//!
//! ```text
//! source ─┬─> [sorter ─┬─> sorted-output writer]
//!         │            └─> summaries
//!         └─> summaries (when not sorting)
//! ```
//!
//! ## Error Handling
//!
//! Library failures surface as `ProcessorError`; the binary adds context
//! with `anyhow` and exits non-zero on the first failure.

use anyhow::{Context, Result};
use clap::Parser;
use sample_processor::{
    cli::{Args, ProcessingConfig, SortOptions},
    io::CsvSampleReader,
    logging,
    pipeline::{SampleConsumer, SampleContext, SampleSource, SampleWriterConsumer},
    report::ReportBuilder,
    sorter::{ColumnComparator, ExternalSampleSorter, SampleComparator},
    summary::{
        ApdexSummary, ErrorsSummary, RequestsSummary, StaticThresholds, StatisticsSummary,
        SummaryConsumer, TopErrorsSummary,
    },
};
use std::time::Instant;
use tracing::{debug, info};

/// Stage names, also the report section names
const REQUESTS: &str = "requests";
const ERRORS: &str = "errors";
const STATISTICS: &str = "statistics";
const APDEX: &str = "apdex";
const TOP_ERRORS: &str = "top5_errors";

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    info!("Starting sample processor {}", sample_processor::VERSION);
    debug!("Configuration: {:?}", args);

    let config = ProcessingConfig::from_args(&args).context("invalid configuration")?;
    let started = Instant::now();

    let context = SampleContext::new(config.working_dir.clone());
    let mut source = SampleSource::new(context);
    for input in &config.inputs {
        let reader = CsvSampleReader::open(input, config.separator)
            .with_context(|| format!("failed to open result file {}", input.display()))?;
        let channel = source.add_channel(Box::new(reader), Some(input.clone()));
        debug!("Channel {} reads {}", channel, input.display());
    }

    let summaries = build_summaries(&config)?;
    match &config.sort {
        Some(sort) => {
            let mut sorter = build_sorter(sort);
            for summary in summaries {
                sorter.core_mut().add_consumer(summary);
            }
            source.add_consumer(Box::new(sorter));
        }
        None => {
            for summary in summaries {
                source.add_consumer(summary);
            }
        }
    }

    let samples = source.run().context("sample pipeline failed")?;

    let mut report = ReportBuilder::new().total_samples(samples);
    for stage in [REQUESTS, ERRORS, STATISTICS, APDEX, TOP_ERRORS] {
        report = report.stage(stage);
    }
    for input in &config.inputs {
        report = report.source(input.display().to_string());
    }
    report
        .write(source.context(), &config.output_file)
        .with_context(|| format!("failed to write report {}", config.output_file.display()))?;

    info!(
        "Processed {} samples in {:.2?}; report written to {}",
        samples,
        started.elapsed(),
        config.output_file.display()
    );
    Ok(())
}

/// Create every summary stage
fn build_summaries(config: &ProcessingConfig) -> Result<Vec<Box<dyn SampleConsumer>>> {
    let [p1, p2, p3] = config.percentiles;
    let statistics =
        StatisticsSummary::with_percentiles(p1, p2, p3).context("invalid statistics percentiles")?;
    let discard = config.discard_controllers;

    let summaries: Vec<Box<dyn SampleConsumer>> = vec![
        Box::new(SummaryConsumer::new(REQUESTS, RequestsSummary::new()).discard_controllers(discard)),
        Box::new(SummaryConsumer::new(ERRORS, ErrorsSummary::new()).discard_controllers(discard)),
        Box::new(SummaryConsumer::new(STATISTICS, statistics).discard_controllers(discard)),
        Box::new(
            SummaryConsumer::new(APDEX, ApdexSummary::new(Box::new(StaticThresholds(config.apdex))))
                .discard_controllers(discard),
        ),
        Box::new(SummaryConsumer::new(TOP_ERRORS, TopErrorsSummary::new()).discard_controllers(discard)),
    ];
    Ok(summaries)
}

/// Create the sorter, with a writer for the sorted samples when requested
fn build_sorter(sort: &SortOptions) -> ExternalSampleSorter {
    let comparator: Box<dyn SampleComparator> = if sort.numeric {
        Box::new(ColumnComparator::numeric(&sort.column))
    } else {
        Box::new(ColumnComparator::text(&sort.column))
    };
    info!(
        "Sorting by {} ({}, chunks of {} samples)",
        sort.column,
        if sort.sorter.reverted_sort { "descending" } else { "ascending" },
        sort.sorter.effective_chunk_size()
    );

    let mut sorter = ExternalSampleSorter::new("sorter", sort.sorter.clone()).with_comparator(comparator);
    if let Some(path) = &sort.sorted_output {
        sorter
            .core_mut()
            .add_consumer(Box::new(SampleWriterConsumer::csv("sorted_writer", 0, path)));
    }
    sorter
}
