//! Chunk files: a bincode metadata header followed by `Some((row, fields))`
//! records and a single `None` terminator.

use super::{RecordReader, RecordWriter};
use crate::error::{ProcessorError, Result};
use crate::sample::{Sample, SampleMetadata};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type EncodedRecord = Option<(u64, Vec<String>)>;

/// Writes one sorted chunk to disk
pub struct ChunkWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    count: u64,
}

impl ChunkWriter {
    /// Create the file and write its metadata header
    pub fn create(path: impl AsRef<Path>, metadata: &SampleMetadata) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| ProcessorError::resource(&path, e))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, metadata)?;
        Ok(Self {
            path,
            writer: Some(writer),
            count: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        let path = &self.path;
        self.writer.as_mut().ok_or_else(|| {
            ProcessorError::configuration(format!("chunk {:?} is already closed", path))
        })
    }
}

impl RecordWriter for ChunkWriter {
    /// The header is written on creation
    fn write_header(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, sample: &Sample) -> Result<()> {
        let record = Some((sample.row(), sample.data()));
        bincode::serialize_into(self.writer()?, &record)?;
        self.count += 1;
        Ok(())
    }

    fn sample_count(&self) -> u64 {
        self.count
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            bincode::serialize_into(&mut writer, &EncodedRecord::None)?;
            writer.flush()?;
        }
        Ok(())
    }
}

/// Reads a chunk back in write order
pub struct ChunkReader {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    metadata: Arc<SampleMetadata>,
}

impl ChunkReader {
    /// Open a chunk, taking its schema from the header
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| ProcessorError::resource(&path, e))?;
        let mut reader = BufReader::new(file);
        let metadata: SampleMetadata = bincode::deserialize_from(&mut reader)?;
        Ok(Self {
            path,
            reader: Some(reader),
            metadata: Arc::new(metadata),
        })
    }

    /// Open a chunk whose header must equal `metadata`; samples share that `Arc`
    pub fn open_with(path: impl AsRef<Path>, metadata: Arc<SampleMetadata>) -> Result<Self> {
        let mut reader = Self::open(path)?;
        if *reader.metadata != *metadata {
            return Err(ProcessorError::configuration(format!(
                "chunk {:?} was written with columns [{}], expected [{}]",
                reader.path, reader.metadata, metadata
            )));
        }
        reader.metadata = metadata;
        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordReader for ChunkReader {
    fn metadata(&self) -> Arc<SampleMetadata> {
        Arc::clone(&self.metadata)
    }

    fn read_next(&mut self) -> Result<Option<Sample>> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(None),
        };
        let record: EncodedRecord = bincode::deserialize_from(reader)?;
        match record {
            Some((row, data)) => Ok(Some(Sample::new(row, Arc::clone(&self.metadata), data)?)),
            None => {
                self.reader = None;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}
