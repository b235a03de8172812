use super::{AttributeValue, SampleConsumer, SampleContext, SampleProducer};
use crate::error::{ProcessorError, Result};
use crate::result_tree::ResultData;
use crate::sample::{Sample, SampleMetadata};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Handle returned when a consumer is attached to a producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

/// The producer half of a stage: the consumers it feeds and the metadata it
/// declared for each channel.
#[derive(Default)]
pub struct Downstream {
    consumers: Vec<(ConsumerId, Box<dyn SampleConsumer>)>,
    next_id: u64,
    produced_metadata: Vec<Option<Arc<SampleMetadata>>>,
}

impl Downstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, consumer: Box<dyn SampleConsumer>) -> ConsumerId {
        let id = ConsumerId(self.next_id);
        self.next_id += 1;
        self.consumers.push((id, consumer));
        id
    }

    pub fn remove(&mut self, id: ConsumerId) -> Option<Box<dyn SampleConsumer>> {
        let position = self.consumers.iter().position(|(cid, _)| *cid == id)?;
        Some(self.consumers.remove(position).1)
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    pub fn consumer(&self, id: ConsumerId) -> Option<&dyn SampleConsumer> {
        self.consumers
            .iter()
            .find(|(cid, _)| *cid == id)
            .map(|(_, c)| c.as_ref())
    }

    /// Metadata declared for `channel` via `set_produced_metadata`
    pub fn produced_metadata(&self, channel: usize) -> Option<&Arc<SampleMetadata>> {
        self.produced_metadata.get(channel).and_then(Option::as_ref)
    }

    pub fn set_context(&mut self, context: &SampleContext) {
        for (_, consumer) in &mut self.consumers {
            consumer.set_context(context.clone());
        }
    }

    pub fn set_channel_attribute(&mut self, channel: usize, key: &str, value: &AttributeValue) {
        for (_, consumer) in &mut self.consumers {
            consumer.set_channel_attribute(channel, key, value.clone());
        }
    }

    fn each_consumer<F>(&mut self, mut action: F) -> Result<()>
    where
        F: FnMut(&mut dyn SampleConsumer) -> Result<()>,
    {
        for (_, consumer) in &mut self.consumers {
            action(consumer.as_mut())
                .map_err(|e| ProcessorError::broadcast(consumer.name(), e))?;
        }
        Ok(())
    }
}

impl SampleProducer for Downstream {
    fn set_produced_metadata(&mut self, metadata: Arc<SampleMetadata>, channel: usize) -> Result<()> {
        if self.produced_metadata.len() <= channel {
            self.produced_metadata.resize(channel + 1, None);
        }
        self.produced_metadata[channel] = Some(Arc::clone(&metadata));
        self.each_consumer(|c| c.set_consumed_metadata(Arc::clone(&metadata), channel))
    }

    fn start_producing(&mut self) -> Result<()> {
        self.each_consumer(|c| c.start_consuming())
    }

    fn produce(&mut self, sample: &Sample, channel: usize) -> Result<()> {
        self.each_consumer(|c| c.consume(sample, channel))
    }

    fn stop_producing(&mut self) -> Result<()> {
        self.each_consumer(|c| c.stop_consuming())
    }
}

/// State every stage carries: its name, the run context, per-channel
/// attribute bags, the metadata it consumes and the consumers it feeds.
pub struct ConsumerCore {
    name: String,
    context: Option<SampleContext>,
    attributes: Vec<HashMap<String, AttributeValue>>,
    consumed_metadata: Vec<Option<Arc<SampleMetadata>>>,
    downstream: Downstream,
}

impl ConsumerCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: None,
            attributes: Vec::new(),
            consumed_metadata: Vec::new(),
            downstream: Downstream::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store the run context and hand it to every downstream consumer
    pub fn set_context(&mut self, context: SampleContext) {
        self.downstream.set_context(&context);
        self.context = Some(context);
    }

    pub fn context(&self) -> Result<&SampleContext> {
        self.context.as_ref().ok_or_else(|| {
            ProcessorError::configuration(format!("stage '{}' has no sample context", self.name))
        })
    }

    /// Set an attribute on `channel` here and on every downstream consumer
    pub fn set_channel_attribute(&mut self, channel: usize, key: &str, value: AttributeValue) {
        if self.attributes.len() <= channel {
            self.attributes.resize_with(channel + 1, HashMap::new);
        }
        self.downstream.set_channel_attribute(channel, key, &value);
        self.attributes[channel].insert(key.to_string(), value);
    }

    pub fn channel_attribute(&self, channel: usize, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(channel).and_then(|bag| bag.get(key))
    }

    pub fn set_consumed_metadata(&mut self, metadata: Arc<SampleMetadata>, channel: usize) {
        debug!(stage = %self.name, channel, columns = metadata.column_count(), "consumed metadata registered");
        if self.consumed_metadata.len() <= channel {
            self.consumed_metadata.resize(channel + 1, None);
        }
        self.consumed_metadata[channel] = Some(metadata);
    }

    pub fn consumed_metadata(&self, channel: usize) -> Result<&Arc<SampleMetadata>> {
        self.consumed_metadata
            .get(channel)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                ProcessorError::configuration(format!(
                    "stage '{}' has no consumed metadata for channel {}",
                    self.name, channel
                ))
            })
    }

    /// Number of channels for which consumed metadata was registered
    pub fn consumed_channel_count(&self) -> usize {
        self.consumed_metadata.iter().filter(|m| m.is_some()).count()
    }

    /// Declare the consumed metadata as produced metadata on every channel.
    ///
    /// Pass-through stages call this from `start_consuming`.
    pub fn pass_through_metadata(&mut self) -> Result<()> {
        let channels: Vec<(usize, Arc<SampleMetadata>)> = self
            .consumed_metadata
            .iter()
            .enumerate()
            .filter_map(|(channel, md)| md.as_ref().map(|md| (channel, Arc::clone(md))))
            .collect();
        for (channel, metadata) in channels {
            self.downstream.set_produced_metadata(metadata, channel)?;
        }
        Ok(())
    }

    /// Attach a consumer, replaying the context and any attributes already set
    pub fn add_consumer(&mut self, mut consumer: Box<dyn SampleConsumer>) -> ConsumerId {
        if let Some(context) = &self.context {
            consumer.set_context(context.clone());
        }
        for (channel, bag) in self.attributes.iter().enumerate() {
            for (key, value) in bag {
                consumer.set_channel_attribute(channel, key, value.clone());
            }
        }
        trace!(stage = %self.name, consumer = %consumer.name(), "consumer attached");
        self.downstream.add(consumer)
    }

    pub fn remove_consumer(&mut self, id: ConsumerId) -> Option<Box<dyn SampleConsumer>> {
        self.downstream.remove(id)
    }

    pub fn downstream(&self) -> &Downstream {
        &self.downstream
    }

    pub fn downstream_mut(&mut self) -> &mut Downstream {
        &mut self.downstream
    }

    /// Namespaced context key for this stage
    pub fn context_key(&self, relative_key: &str) -> String {
        format!("{}{}", self.name, relative_key)
    }

    /// Store `data` in the run context under `name + relative_key`
    pub fn set_data_to_context(&self, relative_key: &str, data: ResultData) -> Result<()> {
        let key = self.context_key(relative_key);
        self.context()?.put_data(key, data);
        Ok(())
    }
}

impl SampleProducer for ConsumerCore {
    fn set_produced_metadata(&mut self, metadata: Arc<SampleMetadata>, channel: usize) -> Result<()> {
        self.downstream.set_produced_metadata(metadata, channel)
    }

    fn start_producing(&mut self) -> Result<()> {
        self.downstream.start_producing()
    }

    fn produce(&mut self, sample: &Sample, channel: usize) -> Result<()> {
        self.downstream.produce(sample, channel)
    }

    fn stop_producing(&mut self) -> Result<()> {
        self.downstream.stop_producing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FilterConsumer;

    fn metadata() -> Arc<SampleMetadata> {
        Arc::new(SampleMetadata::new(',', ["label", "elapsed"]))
    }

    #[test]
    fn test_consumed_channel_count_skips_gaps() {
        let mut core = ConsumerCore::new("stage");
        assert_eq!(core.consumed_channel_count(), 0);

        core.set_consumed_metadata(metadata(), 0);
        core.set_consumed_metadata(metadata(), 2);
        assert_eq!(core.consumed_channel_count(), 2);
        assert!(core.consumed_metadata(1).is_err());

        core.set_consumed_metadata(metadata(), 2);
        assert_eq!(core.consumed_channel_count(), 2);
    }

    #[test]
    fn test_pass_through_declares_every_consumed_channel() {
        let mut core = ConsumerCore::new("stage");
        let id = core.add_consumer(Box::new(FilterConsumer::by_labels("filter", vec![])));
        core.set_consumed_metadata(metadata(), 0);
        core.set_consumed_metadata(metadata(), 3);

        core.pass_through_metadata().unwrap();

        let filter = core.downstream().consumer(id).unwrap();
        assert_eq!(filter.core().consumed_channel_count(), 2);
        assert!(core.downstream().produced_metadata(3).is_some());
        assert!(core.downstream().produced_metadata(1).is_none());
    }
}
