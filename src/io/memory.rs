use super::RecordReader;
use crate::error::Result;
use crate::sample::{Sample, SampleMetadata};
use std::sync::Arc;

/// Replays samples that are already in memory
pub struct MemoryRecordReader {
    metadata: Arc<SampleMetadata>,
    samples: std::vec::IntoIter<Sample>,
}

impl MemoryRecordReader {
    pub fn new(metadata: Arc<SampleMetadata>, samples: Vec<Sample>) -> Self {
        Self {
            metadata,
            samples: samples.into_iter(),
        }
    }
}

impl RecordReader for MemoryRecordReader {
    fn metadata(&self) -> Arc<SampleMetadata> {
        Arc::clone(&self.metadata)
    }

    fn read_next(&mut self) -> Result<Option<Sample>> {
        Ok(self.samples.next())
    }

    fn close(&mut self) -> Result<()> {
        self.samples = Vec::new().into_iter();
        Ok(())
    }
}
