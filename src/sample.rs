//! Sample records and the schema they conform to
//!
//! A [`Sample`] is an immutable row of textual fields described by a shared
//! [`SampleMetadata`]. Typed views (elapsed time, success flag, byte counts)
//! are parsed on demand from the standard result-file columns listed in
//! [`columns`].

use crate::error::{ProcessorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Standard result-file column names
pub mod columns {
    pub const TIMESTAMP: &str = "timeStamp";
    pub const ELAPSED: &str = "elapsed";
    pub const LABEL: &str = "label";
    pub const RESPONSE_CODE: &str = "responseCode";
    pub const RESPONSE_MESSAGE: &str = "responseMessage";
    pub const THREAD_NAME: &str = "threadName";
    pub const DATA_TYPE: &str = "dataType";
    pub const SUCCESS: &str = "success";
    pub const FAILURE_MESSAGE: &str = "failureMessage";
    pub const BYTES: &str = "bytes";
    pub const SENT_BYTES: &str = "sentBytes";
    pub const GRP_THREADS: &str = "grpThreads";
    pub const ALL_THREADS: &str = "allThreads";
    pub const URL: &str = "URL";
    pub const LATENCY: &str = "Latency";
    pub const IDLE_TIME: &str = "IdleTime";
    pub const CONNECT: &str = "Connect";

    /// Column order written by default result-file writers
    pub const STANDARD: [&str; 17] = [
        TIMESTAMP,
        ELAPSED,
        LABEL,
        RESPONSE_CODE,
        RESPONSE_MESSAGE,
        THREAD_NAME,
        DATA_TYPE,
        SUCCESS,
        FAILURE_MESSAGE,
        BYTES,
        SENT_BYTES,
        GRP_THREADS,
        ALL_THREADS,
        URL,
        LATENCY,
        IDLE_TIME,
        CONNECT,
    ];
}

/// Response message prefix that marks a transaction controller sample
pub const CONTROLLER_MESSAGE_PREFIX: &str = "Number of samples in transaction";

/// Ordered column names plus the field separator used on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MetadataHeader", into = "MetadataHeader")]
pub struct SampleMetadata {
    separator: char,
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

/// Serialized form of [`SampleMetadata`]; the lookup index is rebuilt on load
#[derive(Clone, Serialize, Deserialize)]
struct MetadataHeader {
    separator: char,
    columns: Vec<String>,
}

impl From<MetadataHeader> for SampleMetadata {
    fn from(header: MetadataHeader) -> Self {
        SampleMetadata::new(header.separator, header.columns)
    }
}

impl From<SampleMetadata> for MetadataHeader {
    fn from(metadata: SampleMetadata) -> Self {
        MetadataHeader {
            separator: metadata.separator,
            columns: metadata.columns,
        }
    }
}

impl SampleMetadata {
    /// Create metadata from a separator and an ordered list of column names.
    ///
    /// When a name appears twice, lookups resolve to its first position.
    pub fn new<I, S>(separator: char, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            separator,
            columns,
            index,
        }
    }

    /// Metadata for the standard result-file layout
    pub fn standard(separator: char) -> Self {
        Self::new(separator, columns::STANDARD)
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of the named column, if present
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// Position of the named column, or a configuration error
    pub fn require(&self, column: &str) -> Result<usize> {
        self.index_of(column).ok_or_else(|| {
            ProcessorError::configuration(format!("unknown column '{}'", column))
        })
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }
}

impl fmt::Display for SampleMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = self.separator.to_string();
        write!(f, "{}", self.columns.join(&separator))
    }
}

/// One immutable test-execution record
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    row: u64,
    data: Vec<String>,
    metadata: Arc<SampleMetadata>,
}

impl Sample {
    /// Create a sample, checking that it has one field per metadata column
    pub fn new(row: u64, metadata: Arc<SampleMetadata>, data: Vec<String>) -> Result<Self> {
        if data.len() != metadata.column_count() {
            return Err(ProcessorError::configuration(format!(
                "sample #{} has {} fields but metadata declares {} columns",
                row,
                data.len(),
                metadata.column_count()
            )));
        }
        Ok(Self {
            row,
            data,
            metadata,
        })
    }

    /// Row number assigned by the source that produced this sample
    pub fn row(&self) -> u64 {
        self.row
    }

    pub fn metadata(&self) -> &Arc<SampleMetadata> {
        &self.metadata
    }

    /// All fields in column order
    pub fn data(&self) -> &[String] {
        &self.data
    }

    pub fn get_data_at(&self, index: usize) -> Option<&str> {
        self.data.get(index).map(String::as_str)
    }

    /// Raw value of the named column
    pub fn get_data(&self, column: &str) -> Result<&str> {
        let index = self.metadata.require(column)?;
        Ok(self.data[index].as_str())
    }

    /// Parse the named column into `T`
    pub fn parse_data<T: FromStr>(&self, column: &str) -> Result<T> {
        let raw = self.get_data(column)?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| ProcessorError::InvalidSample {
                column: column.to_string(),
                value: raw.to_string(),
            })
    }

    /// Sample label, used as the aggregation key by summaries
    pub fn name(&self) -> Result<&str> {
        self.get_data(columns::LABEL)
    }

    /// Start timestamp in milliseconds since the epoch
    pub fn timestamp(&self) -> Result<i64> {
        self.parse_data(columns::TIMESTAMP)
    }

    /// Elapsed time in milliseconds
    pub fn elapsed_time(&self) -> Result<i64> {
        self.parse_data(columns::ELAPSED)
    }

    pub fn start_time(&self) -> Result<i64> {
        self.timestamp()
    }

    pub fn end_time(&self) -> Result<i64> {
        Ok(self.timestamp()? + self.elapsed_time()?)
    }

    pub fn success(&self) -> Result<bool> {
        let raw = self.get_data(columns::SUCCESS)?;
        match raw.trim() {
            v if v.eq_ignore_ascii_case("true") => Ok(true),
            v if v.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(ProcessorError::InvalidSample {
                column: columns::SUCCESS.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    pub fn response_code(&self) -> Result<&str> {
        self.get_data(columns::RESPONSE_CODE)
    }

    pub fn response_message(&self) -> Result<&str> {
        self.get_data(columns::RESPONSE_MESSAGE)
    }

    pub fn failure_message(&self) -> Result<&str> {
        self.get_data(columns::FAILURE_MESSAGE)
    }

    pub fn received_bytes(&self) -> Result<i64> {
        self.parse_data(columns::BYTES)
    }

    pub fn sent_bytes(&self) -> Result<i64> {
        self.parse_data(columns::SENT_BYTES)
    }

    /// Whether this sample was emitted by a transaction controller.
    ///
    /// Samples without a response message column are never controllers.
    pub fn is_controller(&self) -> bool {
        self.response_message()
            .map(|m| m.starts_with(CONTROLLER_MESSAGE_PREFIX))
            .unwrap_or(false)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = self.metadata.separator().to_string();
        write!(f, "{}", self.data.join(&separator))
    }
}

/// Incrementally assembles samples over a fixed schema.
///
/// Unset columns default to the empty string.
#[derive(Debug, Clone)]
pub struct SampleBuilder {
    metadata: Arc<SampleMetadata>,
    values: Vec<String>,
    next_row: u64,
}

impl SampleBuilder {
    pub fn new(metadata: Arc<SampleMetadata>) -> Self {
        let values = vec![String::new(); metadata.column_count()];
        Self {
            metadata,
            values,
            next_row: 0,
        }
    }

    /// Set the named column of the sample under construction
    pub fn set(&mut self, column: &str, value: impl ToString) -> Result<&mut Self> {
        let index = self.metadata.require(column)?;
        self.values[index] = value.to_string();
        Ok(self)
    }

    /// Emit the current sample and reset the builder for the next row
    pub fn build(&mut self) -> Result<Sample> {
        let fresh = vec![String::new(); self.metadata.column_count()];
        let values = std::mem::replace(&mut self.values, fresh);
        let sample = Sample::new(self.next_row, Arc::clone(&self.metadata), values)?;
        self.next_row += 1;
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Arc<SampleMetadata> {
        Arc::new(SampleMetadata::standard(','))
    }

    #[test]
    fn test_metadata_lookup() {
        let md = SampleMetadata::new(';', ["a", "b", "a"]);
        assert_eq!(md.index_of("a"), Some(0));
        assert_eq!(md.index_of("b"), Some(1));
        assert_eq!(md.index_of("c"), None);
        assert!(md.require("c").is_err());
        assert_eq!(md.to_string(), "a;b;a");
    }

    #[test]
    fn test_metadata_serde_rebuilds_index() {
        let md = SampleMetadata::new('|', ["x", "y"]);
        let bytes = bincode::serialize(&md).unwrap();
        let back: SampleMetadata = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, md);
        assert_eq!(back.index_of("y"), Some(1));
    }

    #[test]
    fn test_typed_accessors() {
        let mut builder = SampleBuilder::new(metadata());
        builder
            .set(columns::TIMESTAMP, 1_000)
            .unwrap()
            .set(columns::ELAPSED, 250)
            .unwrap()
            .set(columns::LABEL, "login")
            .unwrap()
            .set(columns::SUCCESS, "TRUE")
            .unwrap()
            .set(columns::BYTES, 512)
            .unwrap();
        let sample = builder.build().unwrap();

        assert_eq!(sample.row(), 0);
        assert_eq!(sample.name().unwrap(), "login");
        assert_eq!(sample.start_time().unwrap(), 1_000);
        assert_eq!(sample.end_time().unwrap(), 1_250);
        assert!(sample.success().unwrap());
        assert_eq!(sample.received_bytes().unwrap(), 512);
        assert!(!sample.is_controller());

        let next = builder.build().unwrap();
        assert_eq!(next.row(), 1);
        assert!(next.elapsed_time().is_err());
    }

    #[test]
    fn test_controller_detection() {
        let mut builder = SampleBuilder::new(metadata());
        builder
            .set(
                columns::RESPONSE_MESSAGE,
                "Number of samples in transaction : 3, number of failing samples : 0",
            )
            .unwrap();
        assert!(builder.build().unwrap().is_controller());
    }

    #[test]
    fn test_field_count_mismatch() {
        let md = Arc::new(SampleMetadata::new(',', ["a", "b"]));
        assert!(Sample::new(0, md, vec!["1".to_string()]).is_err());
    }
}
