use super::{ConsumerCore, SampleConsumer, SampleProducer};
use crate::error::Result;
use crate::sample::Sample;
use tracing::debug;

/// Predicate deciding whether a sample on a channel is kept
pub type SamplePredicate = Box<dyn Fn(&Sample, usize) -> bool + Send>;

/// Forwards only the samples its predicate accepts.
///
/// With `reverse` set the predicate selects the samples to drop instead.
pub struct FilterConsumer {
    core: ConsumerCore,
    predicate: SamplePredicate,
    reverse: bool,
    kept: u64,
    dropped: u64,
}

impl FilterConsumer {
    pub fn new(name: impl Into<String>, predicate: SamplePredicate) -> Self {
        Self {
            core: ConsumerCore::new(name),
            predicate,
            reverse: false,
            kept: 0,
            dropped: 0,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    /// Keep samples whose label is one of `labels`
    pub fn by_labels(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self::new(
            name,
            Box::new(move |sample, _| {
                sample
                    .name()
                    .map(|label| labels.iter().any(|l| l == label))
                    .unwrap_or(false)
            }),
        )
    }
}

impl SampleConsumer for FilterConsumer {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConsumerCore {
        &mut self.core
    }

    fn start_consuming(&mut self) -> Result<()> {
        self.kept = 0;
        self.dropped = 0;
        self.core.pass_through_metadata()?;
        self.core.start_producing()
    }

    fn consume(&mut self, sample: &Sample, channel: usize) -> Result<()> {
        if (self.predicate)(sample, channel) != self.reverse {
            self.kept += 1;
            self.core.produce(sample, channel)
        } else {
            self.dropped += 1;
            Ok(())
        }
    }

    fn stop_consuming(&mut self) -> Result<()> {
        debug!(stage = %self.core.name(), kept = self.kept, dropped = self.dropped, "filter finished");
        self.core.stop_producing()
    }
}
