//! # Sample Pipeline Framework
//!
//! A pipeline is a tree of stages rooted at a [`SampleSource`]. Every stage
//! owns the consumers it feeds, so the graph is expressed through plain
//! ownership rather than back-references.
//!
//! ## Consumer protocol
//!
//! A driving stage invokes, in this order:
//!
//! 1. `set_consumed_metadata(metadata, channel)` once per channel
//! 2. `start_consuming()`
//! 3. `consume(sample, channel)` zero or more times
//! 4. `stop_consuming()`
//!
//! A stage that also produces declares its produced metadata to its own
//! consumers while starting, then broadcasts with [`SampleProducer`]. The first
//! downstream failure aborts the broadcast and is returned as
//! [`ProcessorError::Broadcast`](crate::error::ProcessorError::Broadcast).

use crate::error::Result;
use crate::sample::{Sample, SampleMetadata};
use std::sync::Arc;

pub mod aggregate;
pub mod context;
pub mod filter;
pub mod source;
pub mod stage;
pub mod writer;

pub use aggregate::AggregateConsumer;
pub use context::SampleContext;
pub use filter::FilterConsumer;
pub use source::SampleSource;
pub use stage::{ConsumerCore, ConsumerId, Downstream};
pub use writer::SampleWriterConsumer;

/// Free-form value stored in a channel attribute bag
pub type AttributeValue = serde_json::Value;

/// Channel attribute naming the file a channel was read from
pub const FILE_ATTRIBUTE: &str = "file";

/// A pipeline stage that receives samples.
///
/// Implementors embed a [`ConsumerCore`] and expose it through `core` and
/// `core_mut`; the bookkeeping methods default to delegating to it.
pub trait SampleConsumer: Send {
    fn core(&self) -> &ConsumerCore;

    fn core_mut(&mut self) -> &mut ConsumerCore;

    /// Stage name, also the namespace of its context keys
    fn name(&self) -> &str {
        self.core().name()
    }

    fn set_context(&mut self, context: SampleContext) {
        self.core_mut().set_context(context);
    }

    fn set_channel_attribute(&mut self, channel: usize, key: &str, value: AttributeValue) {
        self.core_mut().set_channel_attribute(channel, key, value);
    }

    fn channel_attribute(&self, channel: usize, key: &str) -> Option<&AttributeValue> {
        self.core().channel_attribute(channel, key)
    }

    fn set_consumed_metadata(&mut self, metadata: Arc<SampleMetadata>, channel: usize) -> Result<()> {
        self.core_mut().set_consumed_metadata(metadata, channel);
        Ok(())
    }

    /// Initialize per-run state and declare produced metadata downstream
    fn start_consuming(&mut self) -> Result<()>;

    fn consume(&mut self, sample: &Sample, channel: usize) -> Result<()>;

    /// Finalize state, flush resources and stop downstream consumers
    fn stop_consuming(&mut self) -> Result<()>;
}

/// A pipeline stage that emits samples to the consumers it owns
pub trait SampleProducer {
    /// Declare the schema of `channel`; forwarded as consumed metadata
    fn set_produced_metadata(&mut self, metadata: Arc<SampleMetadata>, channel: usize) -> Result<()>;

    /// Broadcast `start_consuming` to every consumer
    fn start_producing(&mut self) -> Result<()>;

    /// Broadcast `consume` to every consumer
    fn produce(&mut self, sample: &Sample, channel: usize) -> Result<()>;

    /// Broadcast `stop_consuming` to every consumer
    fn stop_producing(&mut self) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording consumers shared by the unit tests of this crate

    use super::*;
    use crate::error::ProcessorError;
    use parking_lot::Mutex;

    /// Protocol events observed by a [`RecordingConsumer`]
    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        Metadata(usize),
        Start,
        Consume(u64, usize),
        Stop,
    }

    /// Records every protocol call into a shared log
    pub struct RecordingConsumer {
        core: ConsumerCore,
        pub events: Arc<Mutex<Vec<Event>>>,
        pub samples: Arc<Mutex<Vec<Sample>>>,
        fail_on_row: Option<u64>,
    }

    impl RecordingConsumer {
        pub fn new(name: &str) -> Self {
            Self {
                core: ConsumerCore::new(name),
                events: Arc::new(Mutex::new(Vec::new())),
                samples: Arc::new(Mutex::new(Vec::new())),
                fail_on_row: None,
            }
        }

        pub fn failing_on(name: &str, row: u64) -> Self {
            Self {
                fail_on_row: Some(row),
                ..Self::new(name)
            }
        }
    }

    impl SampleConsumer for RecordingConsumer {
        fn core(&self) -> &ConsumerCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ConsumerCore {
            &mut self.core
        }

        fn set_consumed_metadata(&mut self, metadata: Arc<SampleMetadata>, channel: usize) -> Result<()> {
            self.events.lock().push(Event::Metadata(channel));
            self.core.set_consumed_metadata(metadata, channel);
            Ok(())
        }

        fn start_consuming(&mut self) -> Result<()> {
            self.events.lock().push(Event::Start);
            Ok(())
        }

        fn consume(&mut self, sample: &Sample, channel: usize) -> Result<()> {
            if self.fail_on_row == Some(sample.row()) {
                return Err(ProcessorError::configuration("refusing sample"));
            }
            self.events.lock().push(Event::Consume(sample.row(), channel));
            self.samples.lock().push(sample.clone());
            Ok(())
        }

        fn stop_consuming(&mut self) -> Result<()> {
            self.events.lock().push(Event::Stop);
            Ok(())
        }
    }
}
