use super::{ConsumerCore, SampleConsumer, SampleProducer};
use crate::aggregator::{Aggregator, AggregatorFactory};
use crate::error::Result;
use crate::result_tree::ResultData;
use crate::sample::Sample;
use tracing::debug;

/// Context key suffix under which the aggregate is stored
pub const AGGREGATE_KEY: &str = "_aggregate";

/// Feeds one numeric column of every sample into an aggregator.
///
/// Samples pass through unchanged. On stop the stage stores
/// `{"count", "result"}` under `name + "_aggregate"`.
pub struct AggregateConsumer {
    core: ConsumerCore,
    factory: Box<dyn AggregatorFactory>,
    column: String,
    aggregator: Box<dyn Aggregator>,
}

impl AggregateConsumer {
    pub fn new(name: impl Into<String>, factory: Box<dyn AggregatorFactory>, column: impl Into<String>) -> Self {
        let aggregator = factory.create();
        Self {
            core: ConsumerCore::new(name),
            factory,
            column: column.into(),
            aggregator,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Current value of the running aggregate
    pub fn result(&self) -> f64 {
        self.aggregator.result()
    }
}

impl SampleConsumer for AggregateConsumer {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConsumerCore {
        &mut self.core
    }

    fn start_consuming(&mut self) -> Result<()> {
        self.aggregator = self.factory.create();
        self.core.pass_through_metadata()?;
        self.core.start_producing()
    }

    fn consume(&mut self, sample: &Sample, channel: usize) -> Result<()> {
        let value: f64 = sample.parse_data(&self.column)?;
        self.aggregator.add_value(value);
        self.core.produce(sample, channel)
    }

    fn stop_consuming(&mut self) -> Result<()> {
        let mut data = ResultData::map();
        data.insert("count", self.aggregator.count());
        data.insert("result", self.aggregator.result());
        self.core.set_data_to_context(AGGREGATE_KEY, data)?;
        debug!(
            stage = %self.core.name(),
            aggregator = %self.factory.describe(),
            column = %self.column,
            count = self.aggregator.count(),
            "aggregate stored"
        );
        self.core.stop_producing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::MeanAggregatorFactory;
    use crate::error::ProcessorError;
    use crate::io::MemoryRecordReader;
    use crate::pipeline::testing::RecordingConsumer;
    use crate::pipeline::{SampleContext, SampleSource};
    use crate::sample::SampleMetadata;
    use std::sync::Arc;

    fn source(values: &[&str]) -> SampleSource {
        let metadata = Arc::new(SampleMetadata::new(',', ["elapsed"]));
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(i as u64, Arc::clone(&metadata), vec![v.to_string()]).unwrap())
            .collect();
        let mut source = SampleSource::new(SampleContext::new("/tmp"));
        source.add_channel(Box::new(MemoryRecordReader::new(metadata, samples)), None);
        source
    }

    #[test]
    fn test_mean_of_column_stored_in_context() {
        let mut source = source(&["10", "20", "60"]);
        let mut stage = AggregateConsumer::new("elapsed", Box::new(MeanAggregatorFactory), "elapsed");
        let sink = RecordingConsumer::new("sink");
        let seen = Arc::clone(&sink.samples);
        stage.core_mut().add_consumer(Box::new(sink));
        source.add_consumer(Box::new(stage));
        source.run().unwrap();

        let data = source.context().get_data("elapsed_aggregate").unwrap();
        assert_eq!(data.get("count").and_then(ResultData::as_f64), Some(3.0));
        assert_eq!(data.get("result").and_then(ResultData::as_f64), Some(30.0));
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn test_unparsable_value_fails_run() {
        let mut source = source(&["10", "n/a"]);
        source.add_consumer(Box::new(AggregateConsumer::new(
            "elapsed",
            Box::new(MeanAggregatorFactory),
            "elapsed",
        )));
        let err = source.run().unwrap_err();
        assert!(matches!(err.root_cause(), ProcessorError::InvalidSample { .. }));
    }
}
