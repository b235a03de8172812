//! # External Sample Sorter
//!
//! Sorts a sample stream of unbounded length with bounded memory. Samples
//! are buffered up to the chunk size; a full buffer is merge-sorted in
//! memory and spilled to a chunk file in a private working directory. When
//! consumption stops the remaining buffer is spilled and the chunk files are
//! combined through a binary merge tree whose root streams straight into the
//! downstream consumers. A stream that never fills one chunk is sorted and
//! emitted without touching the disk.
//!
//! Sorting and merging run as fork-join tasks on a private rayon pool; no
//! task outlives the call that spawned it.
//!
//! The working directory is removed when sorting stops, on success or
//! failure, and when the sorter is dropped while unwinding. Release builds
//! abort on panic, so a panic there leaves the chunk files behind in the
//! `<stage>-*` directory under the context working directory.
//!
//! ```text
//! Idle -> Consuming -> (Spilling -> Consuming)* -> Finalizing -> Merging -> Done
//! ```

use crate::defaults;
use crate::error::{ProcessorError, Result};
use crate::pipeline::{ConsumerCore, SampleConsumer, SampleProducer};
use crate::sample::{Sample, SampleMetadata};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

pub mod comparator;
pub mod merge;

pub use comparator::{ColumnComparator, SampleComparator, SortOrder};
use merge::{merge_sort, MergePlan};

/// Sorter tuning, passed in at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SorterConfig {
    /// Samples held in memory before a chunk is spilled; raised to
    /// [`defaults::MIN_CHUNK_SIZE`] when smaller
    pub chunk_size: usize,
    /// Sort and merge on a worker pool
    pub parallelize: bool,
    /// Emit in descending comparator order
    pub reverted_sort: bool,
    /// Worker pool size; one spare thread over the core count by default
    pub worker_threads: usize,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            chunk_size: defaults::CHUNK_SIZE,
            parallelize: true,
            reverted_sort: false,
            worker_threads: default_worker_threads(num_cpus::get()),
        }
    }
}

/// One thread per core plus a spare for transient tasks; a single core
/// stays single-threaded
fn default_worker_threads(cores: usize) -> usize {
    if cores > 1 {
        cores + 1
    } else {
        1
    }
}

impl SorterConfig {
    /// Chunk size actually used, never below the floor
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(defaults::MIN_CHUNK_SIZE)
    }
}

/// Lifecycle of one sort run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortState {
    Idle,
    Consuming,
    Spilling,
    Finalizing,
    Merging,
    Done,
}

impl fmt::Display for SortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortState::Idle => "idle",
            SortState::Consuming => "consuming",
            SortState::Spilling => "spilling",
            SortState::Finalizing => "finalizing",
            SortState::Merging => "merging",
            SortState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Channel the sorter reads and writes
pub const SORTED_CHANNEL: usize = 0;

/// Consumer stage emitting every consumed sample of channel 0 in comparator
/// order once consumption stops
pub struct ExternalSampleSorter {
    core: ConsumerCore,
    config: SorterConfig,
    chunk_size: usize,
    comparator: Option<Box<dyn SampleComparator>>,
    pool: Option<ThreadPool>,
    state: SortState,
    buffer: Vec<Sample>,
    chunks: Vec<PathBuf>,
    working_dir: Option<TempDir>,
    chunk_counter: AtomicU64,
    consumed: u64,
}

impl ExternalSampleSorter {
    pub fn new(name: impl Into<String>, config: SorterConfig) -> Self {
        let chunk_size = config.effective_chunk_size();
        let core = ConsumerCore::new(name);
        if chunk_size != config.chunk_size {
            debug!(stage = %core.name(), requested = config.chunk_size, chunk_size, "chunk size raised to floor");
        }
        Self {
            core,
            config,
            chunk_size,
            comparator: None,
            pool: None,
            state: SortState::Idle,
            buffer: Vec::new(),
            chunks: Vec::new(),
            working_dir: None,
            chunk_counter: AtomicU64::new(0),
            consumed: 0,
        }
    }

    pub fn with_comparator(mut self, comparator: Box<dyn SampleComparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    pub fn set_comparator(&mut self, comparator: Box<dyn SampleComparator>) {
        self.comparator = Some(comparator);
    }

    pub fn config(&self) -> &SorterConfig {
        &self.config
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn state(&self) -> SortState {
        self.state
    }

    /// Number of chunk files spilled during the current run
    pub fn spilled_chunks(&self) -> usize {
        self.chunks.len()
    }

    fn transition(&mut self, next: SortState) {
        debug!(stage = %self.core.name(), from = %self.state, to = %next, "sorter state");
        self.state = next;
    }

    fn metadata(&self) -> Result<Arc<SampleMetadata>> {
        self.core.consumed_metadata(SORTED_CHANNEL).map(Arc::clone)
    }

    fn build_pool(&self) -> Result<Option<ThreadPool>> {
        if !self.config.parallelize || self.config.worker_threads < 2 {
            return Ok(None);
        }
        let stage = self.core.name().to_string();
        ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .thread_name(move |i| format!("{}-worker-{}", stage, i))
            .build()
            .map(Some)
            .map_err(|e| ProcessorError::configuration(format!("failed to build sort worker pool: {}", e)))
    }

    fn create_working_dir(&self) -> Result<TempDir> {
        let parent = self.core.context()?.working_dir();
        tempfile::Builder::new()
            .prefix(&format!("{}-", self.core.name()))
            .tempdir_in(parent)
            .map_err(|e| ProcessorError::resource(parent, e))
    }

    fn plan<'a>(&'a self, comparator: &'a dyn SampleComparator, working_dir: &'a TempDir) -> Result<MergePlan<'a>> {
        Ok(MergePlan {
            metadata: self.metadata()?,
            order: SortOrder::new(comparator, self.config.reverted_sort),
            directory: working_dir.path(),
            counter: &self.chunk_counter,
            pool: self.pool.as_ref(),
        })
    }

    /// Sort the buffer in memory
    fn sort_buffer(&mut self) -> Result<Vec<Sample>> {
        let comparator = self.comparator.as_deref().ok_or_else(comparator::uninitialized)?;
        let buffer = std::mem::take(&mut self.buffer);
        let order = SortOrder::new(comparator, self.config.reverted_sort);
        Ok(merge_sort(buffer, order, self.pool.as_ref()))
    }

    /// Sort the buffer and write it as the next chunk
    fn spill(&mut self) -> Result<()> {
        self.transition(SortState::Spilling);
        let started = Instant::now();
        let sorted = self.sort_buffer()?;
        let comparator = self.comparator.as_deref().ok_or_else(comparator::uninitialized)?;
        let working_dir = self.working_dir.as_ref().ok_or_else(|| {
            ProcessorError::configuration(format!("sorter '{}' has no working directory", self.core.name()))
        })?;
        let path = self.plan(comparator, working_dir)?.spill(&sorted)?;
        debug!(
            stage = %self.core.name(),
            chunk = %path.display(),
            samples = sorted.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chunk spilled"
        );
        self.chunks.push(path);
        self.transition(SortState::Consuming);
        Ok(())
    }

    /// Emit everything consumed, in order, and return how many samples
    /// were emitted
    fn finish(&mut self) -> Result<u64> {
        self.transition(SortState::Finalizing);
        if self.chunks.is_empty() {
            let sorted = self.sort_buffer()?;
            self.transition(SortState::Merging);
            for sample in &sorted {
                self.core.produce(sample, SORTED_CHANNEL)?;
            }
            return Ok(sorted.len() as u64);
        }

        if !self.buffer.is_empty() {
            self.spill()?;
        }
        self.transition(SortState::Merging);
        let chunks = std::mem::take(&mut self.chunks);
        let comparator = self.comparator.as_deref().ok_or_else(comparator::uninitialized)?;
        let working_dir = self.working_dir.as_ref().ok_or_else(|| {
            ProcessorError::configuration(format!("sorter '{}' has no working directory", self.core.name()))
        })?;
        let plan = MergePlan {
            metadata: self.core.consumed_metadata(SORTED_CHANNEL).map(Arc::clone)?,
            order: SortOrder::new(comparator, self.config.reverted_sort),
            directory: working_dir.path(),
            counter: &self.chunk_counter,
            pool: self.pool.as_ref(),
        };
        let core = &mut self.core;
        plan.merge_into(&chunks, |sample| core.produce(&sample, SORTED_CHANNEL))
    }

    /// Remove the working directory and every chunk still in it
    fn cleanup(&mut self) {
        self.buffer = Vec::new();
        self.chunks.clear();
        self.pool = None;
        if let Some(working_dir) = self.working_dir.take() {
            let path = working_dir.path().to_path_buf();
            if let Err(e) = working_dir.close() {
                warn!(stage = %self.core.name(), dir = %path.display(), "failed to remove sort working directory: {}", e);
            }
        }
    }
}

impl SampleConsumer for ExternalSampleSorter {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConsumerCore {
        &mut self.core
    }

    fn start_consuming(&mut self) -> Result<()> {
        let metadata = self.metadata()?;
        let comparator = self.comparator.as_mut().ok_or_else(comparator::uninitialized)?;
        comparator.initialize(&metadata)?;

        self.working_dir = Some(self.create_working_dir()?);
        self.pool = self.build_pool()?;
        self.buffer = Vec::with_capacity(self.chunk_size.min(defaults::MIN_CHUNK_SIZE));
        self.chunks.clear();
        self.consumed = 0;
        self.transition(SortState::Consuming);

        self.core.set_produced_metadata(metadata, SORTED_CHANNEL)?;
        self.core.start_producing()
    }

    fn consume(&mut self, sample: &Sample, channel: usize) -> Result<()> {
        if channel != SORTED_CHANNEL {
            return Err(ProcessorError::configuration(format!(
                "sorter '{}' only sorts channel {}, got a sample on channel {}",
                self.core.name(),
                SORTED_CHANNEL,
                channel
            )));
        }
        self.buffer.push(sample.clone());
        self.consumed += 1;
        if self.buffer.len() >= self.chunk_size {
            self.spill()?;
        }
        Ok(())
    }

    fn stop_consuming(&mut self) -> Result<()> {
        let started = Instant::now();
        let outcome = self.finish();
        let chunks = self.chunk_counter.load(std::sync::atomic::Ordering::Relaxed);
        self.cleanup();
        self.transition(SortState::Done);

        let produced = outcome?;
        if produced != self.consumed {
            return Err(ProcessorError::SortIntegrity {
                expected: self.consumed,
                actual: produced,
            });
        }
        info!(
            stage = %self.core.name(),
            samples = produced,
            chunk_files = chunks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sort completed"
        );
        self.core.stop_producing()
    }
}
