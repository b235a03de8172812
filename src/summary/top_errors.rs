use super::errors::error_key;
use super::{Summary, SummaryState, OVERALL_LABEL};
use crate::defaults;
use crate::error::Result;
use crate::result_tree::ResultData;
use crate::sample::Sample;
use indexmap::IndexMap;

/// Sample and error counts of one label with per-error frequencies
#[derive(Debug, Default, Clone)]
pub struct ErrorFrequencies {
    samples: u64,
    errors: u64,
    counts: IndexMap<String, u64>,
}

impl ErrorFrequencies {
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    fn record(&mut self, error: String) {
        *self.counts.entry(error).or_insert(0) += 1;
    }

    /// The `n` most frequent errors, ties kept in first-seen order
    pub fn top(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.counts.iter().map(|(e, c)| (e.as_str(), *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Most frequent errors per label
#[derive(Debug, Clone)]
pub struct TopErrorsSummary {
    size: usize,
}

impl TopErrorsSummary {
    pub fn new() -> Self {
        Self {
            size: defaults::TOP_ERRORS,
        }
    }
}

impl Default for TopErrorsSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl Summary for TopErrorsSummary {
    type Data = ErrorFrequencies;

    fn new_data(&self, _key: Option<&str>) -> ErrorFrequencies {
        ErrorFrequencies::default()
    }

    fn update_data(&self, data: &mut ErrorFrequencies, sample: &Sample) -> Result<()> {
        data.samples += 1;
        if !sample.success()? {
            data.errors += 1;
            data.record(error_key(sample)?);
        }
        Ok(())
    }

    fn titles(&self) -> Vec<String> {
        let mut titles = vec!["Sample".to_string(), "#Samples".to_string(), "#Errors".to_string()];
        for _ in 0..self.size {
            titles.push("Error".to_string());
            titles.push("#Errors".to_string());
        }
        titles
    }

    fn data_row(&self, key: Option<&str>, data: &ErrorFrequencies, _state: &SummaryState<ErrorFrequencies>) -> ResultData {
        let mut row = ResultData::list();
        row.push(key.unwrap_or(OVERALL_LABEL));
        row.push(data.samples);
        row.push(data.errors);
        let top = data.top(self.size);
        for slot in 0..self.size {
            match top.get(slot) {
                Some((error, count)) => {
                    row.push(*error);
                    row.push(*count);
                }
                None => {
                    row.push("");
                    row.push("");
                }
            }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SampleConsumer;
    use crate::summary::testing::Fixture;
    use crate::summary::{keys, SummaryConsumer};

    fn item_row(export: &ResultData, index: usize) -> &ResultData {
        export
            .get(keys::ITEMS)
            .and_then(|i| i.at(index))
            .and_then(|i| i.get(keys::DATA))
            .unwrap()
    }

    #[test]
    fn test_keeps_five_most_frequent_descending() {
        let mut f = Fixture::new();
        let mut consumer = SummaryConsumer::new("top5", TopErrorsSummary::new());
        consumer.start_consuming().unwrap();
        // Seven distinct codes, code 50n failing n times
        for n in 1..=7_u64 {
            for _ in 0..n {
                consumer.consume(&f.sample("a", 10, false, &format!("50{n}")), 0).unwrap();
            }
        }
        consumer.consume(&f.sample("a", 10, true, "200"), 0).unwrap();

        let export = consumer.export_data();
        let row = item_row(&export, 0);
        assert_eq!(row.at(1).and_then(ResultData::as_f64), Some(29.0));
        assert_eq!(row.at(2).and_then(ResultData::as_f64), Some(28.0));

        let pairs: Vec<(&str, f64)> = (0..5)
            .map(|slot| {
                (
                    row.at(3 + 2 * slot).and_then(ResultData::as_str).unwrap(),
                    row.at(4 + 2 * slot).and_then(ResultData::as_f64).unwrap(),
                )
            })
            .collect();
        assert_eq!(
            pairs,
            vec![("507", 7.0), ("506", 6.0), ("505", 5.0), ("504", 4.0), ("503", 3.0)]
        );
        assert_eq!(row.as_list().map(<[_]>::len), Some(13));
    }

    #[test]
    fn test_frequencies_accumulate_per_error() {
        let mut frequencies = ErrorFrequencies::default();
        for error in ["503", "404", "503", "500", "503", "404"] {
            frequencies.record(error.to_string());
        }
        assert_eq!(frequencies.top(5), vec![("503", 3), ("404", 2), ("500", 1)]);
        assert_eq!(frequencies.top(1), vec![("503", 3)]);
    }

    #[test]
    fn test_pads_missing_slots_and_breaks_ties_by_first_seen() {
        let mut f = Fixture::new();
        let mut consumer = SummaryConsumer::new("top5", TopErrorsSummary::new());
        consumer.start_consuming().unwrap();
        consumer.consume(&f.sample("a", 10, false, "404"), 0).unwrap();
        consumer.consume(&f.sample("a", 10, false, "500"), 0).unwrap();

        let export = consumer.export_data();
        let row = item_row(&export, 0);
        assert_eq!(row.at(3).and_then(ResultData::as_str), Some("404"));
        assert_eq!(row.at(5).and_then(ResultData::as_str), Some("500"));
        for padded in 7..13 {
            assert_eq!(row.at(padded).and_then(ResultData::as_str), Some(""));
        }
    }
}
