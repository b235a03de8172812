use super::{percent, ratio, Summary, SummaryState, OVERALL_LABEL};
use crate::aggregator::{
    Aggregator, MaxAggregator, MeanAggregator, MinAggregator, PercentileAggregator,
    PercentileAggregatorFactory,
};
use crate::defaults;
use crate::error::Result;
use crate::result_tree::ResultData;
use crate::sample::{columns, Sample};

/// Running statistics of one label, or of every sample
#[derive(Debug)]
pub struct StatisticsData {
    count: u64,
    errors: u64,
    mean: MeanAggregator,
    min: MinAggregator,
    max: MaxAggregator,
    median: PercentileAggregator,
    percentiles: [PercentileAggregator; 3],
    first_start: Option<i64>,
    last_end: Option<i64>,
    received_bytes: u64,
    sent_bytes: u64,
}

impl StatisticsData {
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Wall-clock span from the earliest start to the latest end, in ms
    pub fn duration_ms(&self) -> i64 {
        match (self.first_start, self.last_end) {
            (Some(start), Some(end)) => end - start,
            _ => 0,
        }
    }

    /// Samples per second over the wall-clock span
    pub fn throughput(&self) -> f64 {
        ratio(self.count as f64 * 1000.0, self.duration_ms() as f64)
    }

    fn kilobytes_per_second(&self, bytes: u64) -> f64 {
        ratio(bytes as f64 * 1000.0 / 1024.0, self.duration_ms() as f64)
    }
}

/// Optional byte-count column; absent or empty counts as zero
fn byte_count(sample: &Sample, column: &str) -> Result<u64> {
    match sample.metadata().index_of(column) {
        Some(index) if sample.get_data_at(index).map_or(false, |v| !v.trim().is_empty()) => {
            sample.parse_data(column)
        }
        _ => Ok(0),
    }
}

/// Response-time statistics per label: counts, error rate, mean, extremes,
/// median, three configurable percentiles, throughput and byte rates.
#[derive(Debug, Clone)]
pub struct StatisticsSummary {
    median: PercentileAggregatorFactory,
    percentiles: [PercentileAggregatorFactory; 3],
}

impl StatisticsSummary {
    /// Statistics with the default 90th, 95th and 99th percentiles
    pub fn new() -> Result<Self> {
        let [p1, p2, p3] = defaults::PERCENTILES;
        Self::with_percentiles(p1, p2, p3)
    }

    pub fn with_percentiles(p1: f64, p2: f64, p3: f64) -> Result<Self> {
        Ok(Self {
            median: PercentileAggregatorFactory::new(50.0)?,
            percentiles: [
                PercentileAggregatorFactory::new(p1)?,
                PercentileAggregatorFactory::new(p2)?,
                PercentileAggregatorFactory::new(p3)?,
            ],
        })
    }

    pub fn percentiles(&self) -> [f64; 3] {
        [
            self.percentiles[0].percentile(),
            self.percentiles[1].percentile(),
            self.percentiles[2].percentile(),
        ]
    }
}

impl Summary for StatisticsSummary {
    type Data = StatisticsData;

    fn new_data(&self, _key: Option<&str>) -> StatisticsData {
        StatisticsData {
            count: 0,
            errors: 0,
            mean: MeanAggregator::new(),
            min: MinAggregator::default(),
            max: MaxAggregator::default(),
            median: self.median.create_percentile(),
            percentiles: [
                self.percentiles[0].create_percentile(),
                self.percentiles[1].create_percentile(),
                self.percentiles[2].create_percentile(),
            ],
            first_start: None,
            last_end: None,
            received_bytes: 0,
            sent_bytes: 0,
        }
    }

    fn update_data(&self, data: &mut StatisticsData, sample: &Sample) -> Result<()> {
        let elapsed = sample.elapsed_time()? as f64;
        let start = sample.start_time()?;
        let end = sample.end_time()?;

        data.count += 1;
        if !sample.success()? {
            data.errors += 1;
        }
        data.mean.add_value(elapsed);
        data.min.add_value(elapsed);
        data.max.add_value(elapsed);
        data.median.add_value(elapsed);
        for percentile in &mut data.percentiles {
            percentile.add_value(elapsed);
        }
        data.first_start = Some(data.first_start.map_or(start, |s| s.min(start)));
        data.last_end = Some(data.last_end.map_or(end, |e| e.max(end)));
        data.received_bytes += byte_count(sample, columns::BYTES)?;
        data.sent_bytes += byte_count(sample, columns::SENT_BYTES)?;
        Ok(())
    }

    fn titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = [
            "Label",
            "#Samples",
            "KO",
            "Error %",
            "Average",
            "Min",
            "Max",
            "Median",
        ]
        .iter()
        .map(|t| t.to_string())
        .collect();
        titles.extend(self.percentiles().iter().map(|p| format!("{}th pct", p)));
        titles.extend(
            ["Transactions/s", "Received", "Sent"]
                .iter()
                .map(|t| t.to_string()),
        );
        titles
    }

    fn data_row(&self, key: Option<&str>, data: &StatisticsData, _state: &SummaryState<StatisticsData>) -> ResultData {
        let mut row = ResultData::list();
        row.push(key.unwrap_or(OVERALL_LABEL));
        row.push(data.count);
        row.push(data.errors);
        row.push(percent(data.errors, data.count));
        row.push(data.mean.result());
        row.push(data.min.result());
        row.push(data.max.result());
        row.push(data.median.result());
        for percentile in &data.percentiles {
            row.push(percentile.result());
        }
        row.push(data.throughput());
        row.push(data.kilobytes_per_second(data.received_bytes));
        row.push(data.kilobytes_per_second(data.sent_bytes));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SampleConsumer;
    use crate::summary::testing::Fixture;
    use crate::summary::{keys, SummaryConsumer};

    fn column(row: &ResultData, index: usize) -> f64 {
        row.at(index).and_then(ResultData::as_f64).unwrap()
    }

    #[test]
    fn test_rejects_invalid_percentile() {
        assert!(StatisticsSummary::with_percentiles(50.0, 150.0, 99.0).is_err());
    }

    #[test]
    fn test_per_label_row() {
        let mut f = Fixture::new();
        let mut consumer = SummaryConsumer::new("statistics", StatisticsSummary::new().unwrap());
        consumer.start_consuming().unwrap();
        // Four samples spanning 0..2000 ms, one failed
        consumer.consume(&f.at("home", 0, 100, true, "200"), 0).unwrap();
        consumer.consume(&f.at("home", 500, 200, true, "200"), 0).unwrap();
        consumer.consume(&f.at("home", 1_000, 300, false, "500"), 0).unwrap();
        consumer.consume(&f.at("home", 1_600, 400, true, "200"), 0).unwrap();

        let export = consumer.export_data();
        let row = export
            .get(keys::ITEMS)
            .and_then(|i| i.at(0))
            .and_then(|i| i.get(keys::DATA))
            .unwrap();

        assert_eq!(row.at(0).and_then(ResultData::as_str), Some("home"));
        assert_eq!(column(row, 1), 4.0);
        assert_eq!(column(row, 2), 1.0);
        assert_eq!(column(row, 3), 25.0);
        assert_eq!(column(row, 4), 250.0);
        assert_eq!(column(row, 5), 100.0);
        assert_eq!(column(row, 6), 400.0);
        assert_eq!(column(row, 10), 400.0);
        // 4 samples over 2 seconds
        assert_eq!(column(row, 11), 2.0);
        // 4 * 2 KiB received and 4 * 1 KiB sent over 2 seconds
        assert_eq!(column(row, 12), 4.0);
        assert_eq!(column(row, 13), 2.0);
        assert_eq!(row.as_list().map(<[_]>::len), Some(14));
    }

    #[test]
    fn test_overall_of_single_instant_sample_has_zero_throughput() {
        let mut f = Fixture::new();
        let mut consumer = SummaryConsumer::new("statistics", StatisticsSummary::new().unwrap());
        consumer.start_consuming().unwrap();
        consumer.consume(&f.at("home", 1_000, 0, true, "200"), 0).unwrap();

        let export = consumer.export_data();
        let overall = export.get(keys::OVERALL).and_then(|o| o.get(keys::DATA)).unwrap();
        assert_eq!(overall.at(0).and_then(ResultData::as_str), Some(OVERALL_LABEL));
        assert_eq!(column(overall, 11), 0.0);
    }

    #[test]
    fn test_titles_name_configured_percentiles() {
        let summary = StatisticsSummary::with_percentiles(75.0, 90.0, 99.9).unwrap();
        let titles = summary.titles();
        assert_eq!(titles.len(), 14);
        assert_eq!(titles[8], "75th pct");
        assert_eq!(titles[10], "99.9th pct");
    }
}
