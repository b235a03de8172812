//! Record sources and sinks
//!
//! The pipeline core talks to storage only through [`RecordReader`] and
//! [`RecordWriter`]. Three implementations ship with the crate:
//!
//! - [`chunk`]: bincode-encoded chunk files used by the external sorter
//! - [`delimited`]: header-prefixed CSV result files
//! - [`memory`]: in-memory sources for embedding and tests

use crate::error::Result;
use crate::sample::{Sample, SampleMetadata};
use std::sync::Arc;

pub mod chunk;
pub mod delimited;
pub mod memory;

pub use chunk::{ChunkReader, ChunkWriter};
pub use delimited::{CsvSampleReader, CsvSampleWriter};
pub use memory::MemoryRecordReader;

/// Sequential reader of samples conforming to one metadata
pub trait RecordReader: Send {
    /// Schema every sample returned by this reader conforms to
    fn metadata(&self) -> Arc<SampleMetadata>;

    /// Next sample, or `None` once the source is exhausted
    fn read_next(&mut self) -> Result<Option<Sample>>;

    /// Release the underlying resource; further reads return `None`
    fn close(&mut self) -> Result<()>;
}

/// Sequential writer of samples
pub trait RecordWriter: Send {
    /// Write the column-name row, for formats that have one
    fn write_header(&mut self) -> Result<()>;

    fn write(&mut self, sample: &Sample) -> Result<()>;

    /// Number of samples written so far
    fn sample_count(&self) -> u64;

    /// Flush and release the destination
    fn close(&mut self) -> Result<()>;
}
