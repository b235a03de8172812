use crate::error::{ProcessorError, Result};
use crate::sample::{Sample, SampleMetadata};
use std::cmp::Ordering;

/// Total order over samples of one schema.
///
/// `initialize` is called once with the schema of the sorted channel before
/// any comparison and resolves whatever fields `compare` reads.
pub trait SampleComparator: Send + Sync {
    fn initialize(&mut self, metadata: &SampleMetadata) -> Result<()>;

    fn compare(&self, a: &Sample, b: &Sample) -> Ordering;
}

/// Compares one column, either as text or as a number.
///
/// In numeric mode values that do not parse sort after every number.
#[derive(Debug, Clone)]
pub struct ColumnComparator {
    column: String,
    numeric: bool,
    index: Option<usize>,
}

impl ColumnComparator {
    pub fn text(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            numeric: false,
            index: None,
        }
    }

    pub fn numeric(column: impl Into<String>) -> Self {
        Self {
            numeric: true,
            ..Self::text(column)
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    fn number(value: &str) -> f64 {
        value.trim().parse::<f64>().unwrap_or(f64::NAN)
    }
}

impl SampleComparator for ColumnComparator {
    fn initialize(&mut self, metadata: &SampleMetadata) -> Result<()> {
        self.index = Some(metadata.require(&self.column)?);
        Ok(())
    }

    fn compare(&self, a: &Sample, b: &Sample) -> Ordering {
        let index = match self.index {
            Some(index) => index,
            None => return Ordering::Equal,
        };
        let (a, b) = (
            a.get_data_at(index).unwrap_or_default(),
            b.get_data_at(index).unwrap_or_default(),
        );
        if self.numeric {
            Self::number(a).total_cmp(&Self::number(b))
        } else {
            a.cmp(b)
        }
    }
}

/// A comparator together with the direction it is applied in
#[derive(Clone, Copy)]
pub struct SortOrder<'a> {
    comparator: &'a dyn SampleComparator,
    reverted: bool,
}

impl<'a> SortOrder<'a> {
    pub fn new(comparator: &'a dyn SampleComparator, reverted: bool) -> Self {
        Self {
            comparator,
            reverted,
        }
    }

    pub fn compare(&self, a: &Sample, b: &Sample) -> Ordering {
        if self.reverted {
            self.comparator.compare(b, a)
        } else {
            self.comparator.compare(a, b)
        }
    }

    /// Whether `right` must be emitted before `left`; equal samples keep
    /// their encounter order.
    pub fn takes_right(&self, left: &Sample, right: &Sample) -> bool {
        self.compare(left, right) == Ordering::Greater
    }
}

/// Comparator that has not been initialized yet
pub(crate) fn uninitialized() -> ProcessorError {
    ProcessorError::configuration("sorter has no sample comparator")
}
