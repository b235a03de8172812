//! Merge sort in memory and merge trees over chunk files
//!
//! Both levels share the same stability rule: the left side is emitted
//! unless the effective order puts the right side strictly first.

use super::comparator::SortOrder;
use crate::error::{ProcessorError, Result};
use crate::io::{ChunkReader, ChunkWriter, RecordReader, RecordWriter};
use crate::sample::{Sample, SampleMetadata};
use rayon::ThreadPool;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;
use tracing::{trace, warn};

/// Below this many samples a buffer is sorted without further splitting
pub const SEQUENTIAL_CUTOFF: usize = 4_096;

/// Run `a` and `b` in the pool when there is one, one after the other otherwise
pub(crate) fn fork<A, B, RA, RB>(pool: Option<&ThreadPool>, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    match pool {
        Some(pool) => pool.install(|| rayon::join(a, b)),
        None => (a(), b()),
    }
}

/// Merge two sorted runs into one
fn merge_runs(left: Vec<Sample>, right: Vec<Sample>, order: SortOrder<'_>) -> Vec<Sample> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => order.takes_right(l, r),
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged
}

/// Stable recursive merge sort.
///
/// Halves are sorted as independent tasks of `pool` when one is given.
pub fn merge_sort(mut samples: Vec<Sample>, order: SortOrder<'_>, pool: Option<&ThreadPool>) -> Vec<Sample> {
    if samples.len() <= SEQUENTIAL_CUTOFF {
        samples.sort_by(|a, b| order.compare(a, b));
        return samples;
    }
    let right = samples.split_off(samples.len() / 2);
    let (left, right) = fork(
        pool,
        || merge_sort(samples, order, pool),
        || merge_sort(right, order, pool),
    );
    merge_runs(left, right, order)
}

/// Two-way streaming merge of sorted readers.
///
/// Reads one sample ahead on each side and hands every sample to `emit` in
/// merged order. Returns the number of samples emitted.
pub fn merge_streams<F>(
    left: &mut dyn RecordReader,
    right: &mut dyn RecordReader,
    order: SortOrder<'_>,
    mut emit: F,
) -> Result<u64>
where
    F: FnMut(Sample) -> Result<()>,
{
    let mut emitted = 0_u64;
    let mut next_left = left.read_next()?;
    let mut next_right = right.read_next()?;
    loop {
        let take_right = match (&next_left, &next_right) {
            (Some(l), Some(r)) => order.takes_right(l, r),
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let sample = if take_right {
            std::mem::replace(&mut next_right, right.read_next()?)
        } else {
            std::mem::replace(&mut next_left, left.read_next()?)
        };
        if let Some(sample) = sample {
            emit(sample)?;
            emitted += 1;
        }
    }
    Ok(emitted)
}

/// Everything the chunk merge tree needs to name, read and write chunks
pub struct MergePlan<'a> {
    pub metadata: Arc<SampleMetadata>,
    pub order: SortOrder<'a>,
    pub directory: &'a Path,
    pub counter: &'a AtomicU64,
    pub pool: Option<&'a ThreadPool>,
}

impl<'a> MergePlan<'a> {
    /// Fresh, never reused chunk path inside the working directory
    pub fn next_chunk_path(&self) -> PathBuf {
        let sequence = self.counter.fetch_add(1, atomic::Ordering::Relaxed);
        self.directory.join(format!("chunk-{:06}.bin", sequence))
    }

    /// Write a sorted run as a new chunk file
    pub fn spill(&self, samples: &[Sample]) -> Result<PathBuf> {
        let path = self.next_chunk_path();
        let mut writer = ChunkWriter::create(&path, &self.metadata)?;
        for sample in samples {
            writer.write(sample)?;
        }
        writer.close()?;
        Ok(path)
    }

    fn open(&self, path: &Path) -> Result<ChunkReader> {
        ChunkReader::open_with(path, Arc::clone(&self.metadata))
    }

    /// Merge every chunk into a single chunk file, consuming the inputs
    pub fn merge_to_file(&self, chunks: &[PathBuf]) -> Result<PathBuf> {
        match chunks {
            [] => Err(ProcessorError::configuration("no chunk to merge")),
            [single] => Ok(single.clone()),
            _ => {
                let (left, right) = self.merge_halves(chunks)?;
                let path = self.next_chunk_path();
                let mut writer = ChunkWriter::create(&path, &self.metadata)?;
                self.merge_pair(&left, &right, |sample| writer.write(&sample))?;
                writer.close()?;
                trace!(chunk = %path.display(), samples = writer.sample_count(), "chunks merged");
                Ok(path)
            }
        }
    }

    /// Merge every chunk and stream the result to `emit` without writing a
    /// final chunk file
    pub fn merge_into<F>(&self, chunks: &[PathBuf], mut emit: F) -> Result<u64>
    where
        F: FnMut(Sample) -> Result<()>,
    {
        match chunks {
            [] => Ok(0),
            [single] => {
                let mut reader = self.open(single)?;
                let mut emitted = 0_u64;
                while let Some(sample) = reader.read_next()? {
                    emit(sample)?;
                    emitted += 1;
                }
                reader.close()?;
                remove_chunk(single);
                Ok(emitted)
            }
            _ => {
                let (left, right) = self.merge_halves(chunks)?;
                self.merge_pair(&left, &right, emit)
            }
        }
    }

    fn merge_halves(&self, chunks: &[PathBuf]) -> Result<(PathBuf, PathBuf)> {
        let (left, right) = chunks.split_at(chunks.len() / 2);
        let (left, right) = fork(
            self.pool,
            || self.merge_to_file(left),
            || self.merge_to_file(right),
        );
        Ok((left?, right?))
    }

    fn merge_pair<F>(&self, left: &Path, right: &Path, emit: F) -> Result<u64>
    where
        F: FnMut(Sample) -> Result<()>,
    {
        let mut left_reader = self.open(left)?;
        let mut right_reader = self.open(right)?;
        let merged = merge_streams(&mut left_reader, &mut right_reader, self.order, emit)?;
        left_reader.close()?;
        right_reader.close()?;
        remove_chunk(left);
        remove_chunk(right);
        Ok(merged)
    }
}

/// Delete a fully consumed chunk; the working directory removal catches
/// anything left behind.
fn remove_chunk(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(chunk = %path.display(), "failed to delete merged chunk: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorter::comparator::{ColumnComparator, SampleComparator};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn metadata() -> Arc<SampleMetadata> {
        Arc::new(SampleMetadata::new(',', ["key", "tag"]))
    }

    fn samples(keys: &[u32]) -> Vec<Sample> {
        let metadata = metadata();
        keys.iter()
            .enumerate()
            .map(|(row, key)| {
                Sample::new(row as u64, Arc::clone(&metadata), vec![key.to_string(), row.to_string()]).unwrap()
            })
            .collect()
    }

    fn comparator() -> ColumnComparator {
        let mut comparator = ColumnComparator::numeric("key");
        comparator.initialize(&metadata()).unwrap();
        comparator
    }

    fn keys(samples: &[Sample]) -> Vec<u32> {
        samples.iter().map(|s| s.parse_data("key").unwrap()).collect()
    }

    #[test]
    fn test_parallel_merge_sort_is_stable() {
        let mut input: Vec<u32> = (0..20_000).map(|i| i % 97).collect();
        input.shuffle(&mut StdRng::seed_from_u64(5));
        let comparator = comparator();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();

        let sorted = merge_sort(samples(&input), SortOrder::new(&comparator, false), Some(&pool));
        assert_eq!(sorted.len(), input.len());
        for pair in sorted.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let (ka, kb): (u32, u32) = (a.parse_data("key").unwrap(), b.parse_data("key").unwrap());
            assert!(ka < kb || (ka == kb && a.row() < b.row()));
        }
    }

    #[test]
    fn test_sequential_reverted_sort() {
        let comparator = comparator();
        let sorted = merge_sort(samples(&[3, 1, 2]), SortOrder::new(&comparator, true), None);
        assert_eq!(keys(&sorted), vec![3, 2, 1]);
    }

    #[test]
    fn test_merge_tree_over_odd_number_of_chunks() {
        let dir = tempdir().unwrap();
        let comparator = comparator();
        let counter = AtomicU64::new(0);
        let plan = MergePlan {
            metadata: metadata(),
            order: SortOrder::new(&comparator, false),
            directory: dir.path(),
            counter: &counter,
            pool: None,
        };

        let runs: [&[u32]; 5] = [&[1, 6, 11], &[2, 7], &[0, 5, 10], &[3, 8, 13], &[4, 9, 12, 14]];
        let chunks: Vec<PathBuf> = runs.iter().map(|run| plan.spill(&samples(run)).unwrap()).collect();

        let mut merged = Vec::new();
        let count = plan
            .merge_into(&chunks, |sample| {
                merged.push(sample);
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 15);
        assert_eq!(keys(&merged), (0..15).collect::<Vec<u32>>());
        // Every chunk, original or intermediate, has been consumed
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_emit_failure_stops_merge() {
        let dir = tempdir().unwrap();
        let comparator = comparator();
        let counter = AtomicU64::new(0);
        let plan = MergePlan {
            metadata: metadata(),
            order: SortOrder::new(&comparator, false),
            directory: dir.path(),
            counter: &counter,
            pool: None,
        };
        let chunks = vec![
            plan.spill(&samples(&[1, 3])).unwrap(),
            plan.spill(&samples(&[2, 4])).unwrap(),
        ];

        let mut seen = 0;
        let result = plan.merge_into(&chunks, |_| {
            seen += 1;
            if seen == 2 {
                Err(ProcessorError::configuration("downstream refused"))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert_eq!(seen, 2);
    }
}
