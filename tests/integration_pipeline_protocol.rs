use anyhow::Result;
use parking_lot::Mutex;
use sample_processor::aggregator::{MaxAggregatorFactory, MeanAggregatorFactory};
use sample_processor::io::MemoryRecordReader;
use sample_processor::pipeline::{
    AggregateConsumer, ConsumerCore, FilterConsumer, SampleConsumer, SampleContext, SampleSource, FILE_ATTRIBUTE,
};
use sample_processor::{ProcessorError, Sample, SampleMetadata, SampleProducer};
use std::path::PathBuf;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

/// Logs every protocol call as `name:event`, forwarding samples downstream
struct Tracer {
    core: ConsumerCore,
    log: Log,
    fail_on_row: Option<u64>,
}

impl Tracer {
    fn new(name: &str, log: &Log) -> Self {
        Self {
            core: ConsumerCore::new(name),
            log: Arc::clone(log),
            fail_on_row: None,
        }
    }

    fn record(&self, event: impl std::fmt::Display) {
        self.log.lock().push(format!("{}:{}", self.core.name(), event));
    }
}

impl SampleConsumer for Tracer {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConsumerCore {
        &mut self.core
    }

    fn start_consuming(&mut self) -> sample_processor::Result<()> {
        self.record("start");
        self.core.pass_through_metadata()?;
        self.core.start_producing()
    }

    fn consume(&mut self, sample: &Sample, channel: usize) -> sample_processor::Result<()> {
        if self.fail_on_row == Some(sample.row()) {
            return Err(ProcessorError::configuration(format!("refusing row {}", sample.row())));
        }
        self.record(format_args!("{}/{}", channel, sample.row()));
        self.core.produce(sample, channel)
    }

    fn stop_consuming(&mut self) -> sample_processor::Result<()> {
        self.record("stop");
        self.core.stop_producing()
    }
}

fn reader(rows: &[(&str, u32)]) -> Box<MemoryRecordReader> {
    let metadata = Arc::new(SampleMetadata::new(',', ["label", "elapsed"]));
    let samples = rows
        .iter()
        .enumerate()
        .map(|(row, (label, elapsed))| {
            Sample::new(row as u64, Arc::clone(&metadata), vec![label.to_string(), elapsed.to_string()]).unwrap()
        })
        .collect();
    Box::new(MemoryRecordReader::new(metadata, samples))
}

/// Each consumer sees start, every sample of every channel in order, then
/// stop; siblings are called in attachment order.
#[test]
fn protocol_order_across_channels_and_consumers() -> Result<()> {
    let log: Log = Arc::default();
    let mut source = SampleSource::new(SampleContext::new(std::env::temp_dir()));
    source.add_channel(reader(&[("a", 1), ("b", 2)]), None);
    source.add_channel(reader(&[("c", 3)]), None);

    let mut parent = Tracer::new("parent", &log);
    parent.core_mut().add_consumer(Box::new(Tracer::new("child", &log)));
    source.add_consumer(Box::new(parent));
    source.add_consumer(Box::new(Tracer::new("sibling", &log)));

    assert_eq!(source.run()?, 3);

    let expected = [
        "parent:start", "child:start", "sibling:start",
        "parent:0/0", "child:0/0", "sibling:0/0",
        "parent:0/1", "child:0/1", "sibling:0/1",
        "parent:1/0", "child:1/0", "sibling:1/0",
        "parent:stop", "child:stop", "sibling:stop",
    ];
    assert_eq!(*log.lock(), expected);
    Ok(())
}

/// Attributes set before a consumer is attached are replayed to it; later
/// ones are forwarded through the whole subtree.
#[test]
fn channel_attributes_reach_late_consumers() -> Result<()> {
    let mut filter = FilterConsumer::by_labels("filter", vec!["a".to_string()]);
    filter.set_channel_attribute(0, FILE_ATTRIBUTE, serde_json::json!("early.jtl"));

    let id = filter.core_mut().add_consumer(Box::new(FilterConsumer::by_labels("nested", vec![])));
    filter.set_channel_attribute(1, FILE_ATTRIBUTE, serde_json::json!("late.jtl"));

    let nested = filter.core().downstream().consumer(id).expect("nested consumer attached");
    assert_eq!(nested.channel_attribute(0, FILE_ATTRIBUTE), Some(&serde_json::json!("early.jtl")));
    assert_eq!(nested.channel_attribute(1, FILE_ATTRIBUTE), Some(&serde_json::json!("late.jtl")));
    assert_eq!(nested.channel_attribute(2, FILE_ATTRIBUTE), None);
    Ok(())
}

#[test]
fn source_publishes_channel_file() -> Result<()> {
    let mut source = SampleSource::new(SampleContext::new(std::env::temp_dir()));
    source.add_channel(reader(&[("a", 1)]), Some(PathBuf::from("results.jtl")));
    let id = source.add_consumer(Box::new(FilterConsumer::by_labels("filter", vec![])));
    source.run()?;

    let filter = source.remove_consumer(id).expect("filter attached");
    assert_eq!(filter.channel_attribute(0, FILE_ATTRIBUTE), Some(&serde_json::json!("results.jtl")));
    Ok(())
}

/// Filters and aggregates compose; aggregates land in the shared context.
#[test]
fn filtered_aggregates_in_context() -> Result<()> {
    let context = SampleContext::new(std::env::temp_dir());
    let mut source = SampleSource::new(context.clone());
    source.add_channel(reader(&[("a", 10), ("b", 500), ("a", 30), ("b", 700)]), None);

    let mut filter = FilterConsumer::by_labels("only_a", vec!["a".to_string()]);
    filter
        .core_mut()
        .add_consumer(Box::new(AggregateConsumer::new("mean_a", Box::new(MeanAggregatorFactory), "elapsed")));
    source.add_consumer(Box::new(filter));
    source.add_consumer(Box::new(AggregateConsumer::new("max_all", Box::new(MaxAggregatorFactory), "elapsed")));
    source.run()?;

    let mean = context.get_data("mean_a_aggregate").expect("mean stored");
    assert_eq!(mean.get("result").and_then(|v| v.as_f64()), Some(20.0));
    assert_eq!(mean.get("count").and_then(|v| v.as_f64()), Some(2.0));
    let max = context.get_data("max_all_aggregate").expect("max stored");
    assert_eq!(max.get("result").and_then(|v| v.as_f64()), Some(700.0));
    Ok(())
}

/// A failure deep in the tree reaches the root wrapped once, naming the
/// consumer that failed, and nothing after it is consumed.
#[test]
fn downstream_failure_stops_the_run() -> Result<()> {
    let log: Log = Arc::default();
    let mut source = SampleSource::new(SampleContext::new(std::env::temp_dir()));
    source.add_channel(reader(&[("a", 1), ("b", 2), ("c", 3)]), None);

    let mut child = Tracer::new("child", &log);
    child.fail_on_row = Some(1);
    let mut parent = Tracer::new("parent", &log);
    parent.core_mut().add_consumer(Box::new(child));
    source.add_consumer(Box::new(parent));

    let err = source.run().unwrap_err();
    match &err {
        ProcessorError::Broadcast { consumer, source } => {
            assert_eq!(consumer, "child");
            assert!(matches!(**source, ProcessorError::Configuration(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let log = log.lock();
    assert!(!log.iter().any(|e| e.ends_with("0/2")));
    assert!(!log.iter().any(|e| e.ends_with("stop")));
    Ok(())
}

#[test]
fn producer_declares_metadata_to_consumers() -> Result<()> {
    let metadata = Arc::new(SampleMetadata::new(';', ["label"]));
    let mut core = ConsumerCore::new("producer");
    let id = core.add_consumer(Box::new(FilterConsumer::by_labels("filter", vec![])));

    core.set_produced_metadata(Arc::clone(&metadata), 2)?;

    let filter = core.downstream().consumer(id).expect("filter attached");
    assert_eq!(filter.core().consumed_metadata(2)?.separator(), ';');
    assert!(filter.core().consumed_metadata(0).is_err());
    Ok(())
}
