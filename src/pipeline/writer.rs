use super::{ConsumerCore, SampleConsumer};
use crate::error::{ProcessorError, Result};
use crate::io::{CsvSampleWriter, RecordWriter};
use crate::sample::{Sample, SampleMetadata};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Opens the destination once the channel's metadata is known
pub type WriterFactory = Box<dyn FnMut(Arc<SampleMetadata>) -> Result<Box<dyn RecordWriter>> + Send>;

/// Terminal stage writing every sample of one channel to a record sink
pub struct SampleWriterConsumer {
    core: ConsumerCore,
    factory: WriterFactory,
    channel: usize,
    write_header: bool,
    writer: Option<Box<dyn RecordWriter>>,
}

impl SampleWriterConsumer {
    pub fn new(name: impl Into<String>, channel: usize, write_header: bool, factory: WriterFactory) -> Self {
        Self {
            core: ConsumerCore::new(name),
            factory,
            channel,
            write_header,
            writer: None,
        }
    }

    /// Write channel `channel` as a delimited file with a header row
    pub fn csv(name: impl Into<String>, channel: usize, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(
            name,
            channel,
            true,
            Box::new(move |metadata| {
                let writer = CsvSampleWriter::create(&path, metadata)?;
                Ok(Box::new(writer) as Box<dyn RecordWriter>)
            }),
        )
    }
}

impl SampleConsumer for SampleWriterConsumer {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConsumerCore {
        &mut self.core
    }

    fn start_consuming(&mut self) -> Result<()> {
        let metadata = Arc::clone(self.core.consumed_metadata(self.channel)?);
        let mut writer = (self.factory)(metadata)?;
        if self.write_header {
            writer.write_header()?;
        }
        self.writer = Some(writer);
        Ok(())
    }

    fn consume(&mut self, sample: &Sample, channel: usize) -> Result<()> {
        if channel != self.channel {
            return Ok(());
        }
        match self.writer.as_mut() {
            Some(writer) => writer.write(sample),
            None => Err(ProcessorError::configuration(format!(
                "writer '{}' consumed before start",
                self.core.name()
            ))),
        }
    }

    fn stop_consuming(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.close()?;
            info!(stage = %self.core.name(), samples = writer.sample_count(), "samples written");
        }
        Ok(())
    }
}
