use crate::defaults;
use crate::error::{ProcessorError, Result};
use crate::sorter::SorterConfig;
use crate::summary::Thresholds;
use clap::Parser;
use std::path::PathBuf;

/// Sample Processor - summarize and sort load-test result files
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Result file to process; repeat for additional channels
    #[clap(short = 'i', long = "input", required = true, help_heading = "Input Options")]
    pub inputs: Vec<PathBuf>,

    /// Field separator of the result files
    #[clap(long, default_value_t = defaults::SEPARATOR, help_heading = "Input Options")]
    pub separator: char,

    /// Output file for the report (JSON format)
    #[clap(short = 'o', long = "output", default_value = defaults::OUTPUT_FILE)]
    pub output_file: PathBuf,

    /// Sort samples by this column before summarizing
    #[clap(long, help_heading = "Sort Options")]
    pub sort_by: Option<String>,

    /// Compare the sort column as numbers instead of text
    #[clap(long, default_value_t = false, help_heading = "Sort Options")]
    pub numeric_sort: bool,

    /// Sort in descending order
    #[clap(long, default_value_t = false, help_heading = "Sort Options")]
    pub reverse: bool,

    /// Samples held in memory before a chunk is spilled to disk
    #[clap(long, default_value_t = defaults::CHUNK_SIZE, help_heading = "Sort Options")]
    pub chunk_size: usize,

    /// Sort on the calling thread only
    #[clap(long, default_value_t = false, help_heading = "Sort Options")]
    pub sequential: bool,

    /// Also write the sorted samples to this file
    #[clap(long, requires = "sort_by", help_heading = "Sort Options")]
    pub sorted_output: Option<PathBuf>,

    /// The three percentiles reported by the statistics summary
    #[clap(long, value_delimiter = ',', default_values_t = defaults::PERCENTILES.to_vec(), help_heading = "Summary Options")]
    pub percentiles: Vec<f64>,

    /// Apdex satisfied threshold in milliseconds
    #[clap(long, default_value_t = defaults::APDEX_SATISFIED_MS, help_heading = "Summary Options")]
    pub apdex_satisfied: u64,

    /// Apdex tolerated threshold in milliseconds
    #[clap(long, default_value_t = defaults::APDEX_TOLERATED_MS, help_heading = "Summary Options")]
    pub apdex_tolerated: u64,

    /// Leave transaction controller samples out of the summaries
    #[clap(long, default_value_t = false, help_heading = "Summary Options")]
    pub discard_controllers: bool,

    /// Directory for temporary sort files (defaults to the system temp dir)
    #[clap(long)]
    pub working_dir: Option<PathBuf>,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

/// Sort settings resolved from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct SortOptions {
    pub column: String,
    pub numeric: bool,
    pub sorter: SorterConfig,
    pub sorted_output: Option<PathBuf>,
}

/// Validated configuration for one processing run
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    pub inputs: Vec<PathBuf>,
    pub separator: char,
    pub output_file: PathBuf,
    pub sort: Option<SortOptions>,
    pub percentiles: [f64; 3],
    pub apdex: Thresholds,
    pub discard_controllers: bool,
    pub working_dir: PathBuf,
}

impl ProcessingConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let percentiles: [f64; 3] = args.percentiles.as_slice().try_into().map_err(|_| {
            ProcessorError::configuration(format!(
                "exactly three percentiles are required, got {}",
                args.percentiles.len()
            ))
        })?;

        if args.apdex_satisfied > args.apdex_tolerated {
            return Err(ProcessorError::configuration(format!(
                "apdex satisfied threshold ({} ms) exceeds tolerated threshold ({} ms)",
                args.apdex_satisfied, args.apdex_tolerated
            )));
        }

        let sort = match &args.sort_by {
            Some(column) => {
                if args.inputs.len() > 1 {
                    return Err(ProcessorError::configuration(
                        "sorting supports a single --input",
                    ));
                }
                Some(SortOptions {
                    column: column.clone(),
                    numeric: args.numeric_sort,
                    sorter: SorterConfig {
                        chunk_size: args.chunk_size,
                        parallelize: !args.sequential,
                        reverted_sort: args.reverse,
                        ..SorterConfig::default()
                    },
                    sorted_output: args.sorted_output.clone(),
                })
            }
            None => None,
        };

        Ok(Self {
            inputs: args.inputs.clone(),
            separator: args.separator,
            output_file: args.output_file.clone(),
            sort,
            percentiles,
            apdex: Thresholds {
                satisfied: args.apdex_satisfied,
                tolerated: args.apdex_tolerated,
            },
            discard_controllers: args.discard_controllers,
            working_dir: args.working_dir.clone().unwrap_or_else(std::env::temp_dir),
        })
    }
}
