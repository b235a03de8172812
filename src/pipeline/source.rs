use super::{
    AttributeValue, ConsumerId, Downstream, SampleConsumer, SampleContext, SampleProducer,
    FILE_ATTRIBUTE,
};
use crate::error::Result;
use crate::io::RecordReader;
use std::path::PathBuf;
use tracing::{debug, info, warn};

struct SourceChannel {
    reader: Box<dyn RecordReader>,
    origin: Option<PathBuf>,
}

/// Root of a pipeline: reads every channel and pushes its samples downstream.
///
/// Channels are produced one after another, in the order they were added.
pub struct SampleSource {
    context: SampleContext,
    channels: Vec<SourceChannel>,
    downstream: Downstream,
}

impl SampleSource {
    pub fn new(context: SampleContext) -> Self {
        Self {
            context,
            channels: Vec::new(),
            downstream: Downstream::new(),
        }
    }

    pub fn context(&self) -> &SampleContext {
        &self.context
    }

    /// Register a reader as the next channel and return its number.
    ///
    /// When `origin` is given it is published as the `file` channel attribute.
    pub fn add_channel(&mut self, reader: Box<dyn RecordReader>, origin: Option<PathBuf>) -> usize {
        self.channels.push(SourceChannel { reader, origin });
        self.channels.len() - 1
    }

    pub fn add_consumer(&mut self, mut consumer: Box<dyn SampleConsumer>) -> ConsumerId {
        consumer.set_context(self.context.clone());
        self.downstream.add(consumer)
    }

    pub fn remove_consumer(&mut self, id: ConsumerId) -> Option<Box<dyn SampleConsumer>> {
        self.downstream.remove(id)
    }

    /// Drive the whole pipeline once and return the number of samples read.
    ///
    /// Readers are closed whether or not the run succeeds.
    pub fn run(&mut self) -> Result<u64> {
        info!(
            channels = self.channels.len(),
            consumers = self.downstream.len(),
            "starting sample pipeline"
        );
        let outcome = self.drive();

        let mut close_result = Ok(());
        for (channel, source) in self.channels.iter_mut().enumerate() {
            if let Err(e) = source.reader.close() {
                warn!(channel, "failed to close reader: {}", e);
                if close_result.is_ok() {
                    close_result = Err(e);
                }
            }
        }

        let produced = outcome?;
        close_result?;
        info!(samples = produced, "sample pipeline completed");
        Ok(produced)
    }

    fn drive(&mut self) -> Result<u64> {
        for (channel, source) in self.channels.iter().enumerate() {
            if let Some(origin) = &source.origin {
                let value = AttributeValue::String(origin.display().to_string());
                self.downstream
                    .set_channel_attribute(channel, FILE_ATTRIBUTE, &value);
            }
        }
        for channel in 0..self.channels.len() {
            let metadata = self.channels[channel].reader.metadata();
            self.downstream.set_produced_metadata(metadata, channel)?;
        }

        self.downstream.start_producing()?;

        let mut produced = 0_u64;
        for channel in 0..self.channels.len() {
            let mut count = 0_u64;
            while let Some(sample) = self.channels[channel].reader.read_next()? {
                self.downstream.produce(&sample, channel)?;
                count += 1;
            }
            debug!(channel, samples = count, "channel exhausted");
            produced += count;
        }

        self.downstream.stop_producing()?;
        Ok(produced)
    }
}
