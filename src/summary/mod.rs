//! # Summary Consumers
//!
//! A summary observes the sample stream and keeps one running aggregate
//! overall plus one per aggregation key, usually the sample label. Every
//! summary is driven by the same generic stage, [`SummaryConsumer`], which
//! owns the bookkeeping:
//!
//! - aggregates are created lazily the first time a key is seen and are
//!   exported in first-seen order
//! - every sample is passed through unchanged to downstream consumers
//! - on stop the exported [`ResultData`] is stored in the run context under
//!   `name + "_summary"`
//!
//! The [`Summary`] trait supplies what differs between summaries: how a
//! key is derived, how a sample updates an aggregate and how an aggregate is
//! rendered as a row.
//!
//! Ratios with a zero denominator are reported as `0.0` throughout.

use crate::error::Result;
use crate::pipeline::{ConsumerCore, SampleConsumer, SampleProducer};
use crate::result_tree::ResultData;
use crate::sample::Sample;
use indexmap::IndexMap;
use tracing::{debug, info};

pub mod apdex;
pub mod errors;
pub mod requests;
pub mod statistics;
pub mod top_errors;

pub use apdex::{ApdexSummary, PerLabelThresholds, StaticThresholds, ThresholdSelector, Thresholds};
pub use errors::ErrorsSummary;
pub use requests::RequestsSummary;
pub use statistics::StatisticsSummary;
pub use top_errors::TopErrorsSummary;

/// Context key suffix under which summaries store their export
pub const SUMMARY_KEY: &str = "_summary";

/// Label used for the overall row
pub const OVERALL_LABEL: &str = "Total";

/// Exported key names
pub mod keys {
    pub const SUPPORTS_CONTROLLERS_DISCARDING: &str = "supportsControllersDiscarding";
    pub const OVERALL: &str = "overall";
    pub const ITEMS: &str = "items";
    pub const TITLES: &str = "titles";
    pub const DATA: &str = "data";
    pub const IS_CONTROLLER: &str = "isController";
}

/// `numerator / denominator`, or `0.0` when the denominator is zero
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// `100 * part / total`, or `0.0` when `total` is zero
pub fn percent(part: u64, total: u64) -> f64 {
    ratio(100.0 * part as f64, total as f64)
}

/// One aggregate plus whether its key belongs to a controller sample
#[derive(Debug)]
pub struct SummaryInfo<D> {
    is_controller: bool,
    data: D,
}

impl<D> SummaryInfo<D> {
    pub fn is_controller(&self) -> bool {
        self.is_controller
    }

    pub fn data(&self) -> &D {
        &self.data
    }
}

/// Aggregates collected by a [`SummaryConsumer`] during one run
#[derive(Debug)]
pub struct SummaryState<D> {
    overall: Option<SummaryInfo<D>>,
    items: IndexMap<String, SummaryInfo<D>>,
    sample_count: u64,
}

impl<D> SummaryState<D> {
    fn new(overall: Option<D>) -> Self {
        Self {
            overall: overall.map(|data| SummaryInfo {
                is_controller: false,
                data,
            }),
            items: IndexMap::new(),
            sample_count: 0,
        }
    }

    pub fn overall(&self) -> Option<&SummaryInfo<D>> {
        self.overall.as_ref()
    }

    /// Keyed aggregates in first-seen order
    pub fn items(&self) -> impl Iterator<Item = (&str, &SummaryInfo<D>)> {
        self.items.iter().map(|(key, info)| (key.as_str(), info))
    }

    pub fn get(&self, key: &str) -> Option<&SummaryInfo<D>> {
        self.items.get(key)
    }

    /// Samples aggregated so far, whether or not they produced a key
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    fn entry_or_insert_with<F>(&mut self, key: String, is_controller: bool, create: F) -> &mut SummaryInfo<D>
    where
        F: FnOnce(&str) -> D,
    {
        self.items.entry(key).or_insert_with_key(|key| SummaryInfo {
            is_controller,
            data: create(key),
        })
    }
}

/// Behaviour of one kind of summary
pub trait Summary: Send {
    /// Aggregate kept per key and overall
    type Data: Send;

    /// Fresh aggregate for `key`; `None` requests the overall aggregate
    fn new_data(&self, key: Option<&str>) -> Self::Data;

    /// Aggregation key of a sample, or `None` to leave keyed data untouched
    fn key_of(&self, sample: &Sample) -> Result<Option<String>> {
        Ok(Some(sample.name()?.to_string()))
    }

    fn update_data(&self, data: &mut Self::Data, sample: &Sample) -> Result<()>;

    fn has_overall(&self) -> bool {
        true
    }

    fn supports_controllers_discarding(&self) -> bool {
        true
    }

    /// Whether a sample contributes to the overall aggregate
    fn include_in_overall(&self, sample: &Sample) -> bool {
        !sample.is_controller()
    }

    /// Column titles of the exported rows
    fn titles(&self) -> Vec<String>;

    /// Exported row of one aggregate; `key` is `None` for the overall row
    fn data_row(&self, key: Option<&str>, data: &Self::Data, state: &SummaryState<Self::Data>) -> ResultData;

    /// Full export; defaults to the keyed layout
    fn export(&self, state: &SummaryState<Self::Data>) -> ResultData
    where
        Self: Sized,
    {
        export_keyed(self, state)
    }
}

fn info_node<S: Summary>(
    summary: &S,
    key: Option<&str>,
    info: &SummaryInfo<S::Data>,
    state: &SummaryState<S::Data>,
) -> ResultData {
    let mut node = ResultData::map();
    node.insert(keys::DATA, summary.data_row(key, &info.data, state));
    node.insert(keys::IS_CONTROLLER, info.is_controller);
    node
}

/// Keyed export shared by every summary with per-key rows
pub fn export_keyed<S: Summary>(summary: &S, state: &SummaryState<S::Data>) -> ResultData {
    let mut result = ResultData::map();
    result.insert(
        keys::SUPPORTS_CONTROLLERS_DISCARDING,
        summary.supports_controllers_discarding(),
    );
    if let Some(overall) = state.overall() {
        result.insert(keys::OVERALL, info_node(summary, None, overall, state));
    }

    let items: Vec<ResultData> = state
        .items()
        .map(|(key, info)| info_node(summary, Some(key), info, state))
        .collect();
    result.insert(keys::ITEMS, items);

    let titles: Vec<ResultData> = summary.titles().into_iter().map(ResultData::from).collect();
    result.insert(keys::TITLES, titles);
    result
}

/// Pipeline stage that drives a [`Summary`]
pub struct SummaryConsumer<S: Summary> {
    core: ConsumerCore,
    summary: S,
    discard_controllers: bool,
    state: SummaryState<S::Data>,
}

impl<S: Summary> SummaryConsumer<S> {
    pub fn new(name: impl Into<String>, summary: S) -> Self {
        let state = Self::fresh_state(&summary);
        Self {
            core: ConsumerCore::new(name),
            summary,
            discard_controllers: false,
            state,
        }
    }

    /// Skip controller samples entirely, when the summary allows it
    pub fn discard_controllers(mut self, discard: bool) -> Self {
        self.discard_controllers = discard;
        self
    }

    pub fn summary(&self) -> &S {
        &self.summary
    }

    pub fn state(&self) -> &SummaryState<S::Data> {
        &self.state
    }

    /// Current export of the summary
    pub fn export_data(&self) -> ResultData {
        self.summary.export(&self.state)
    }

    fn fresh_state(summary: &S) -> SummaryState<S::Data> {
        let overall = summary.has_overall().then(|| summary.new_data(None));
        SummaryState::new(overall)
    }

    fn aggregate(&mut self, sample: &Sample) -> Result<()> {
        if self.discard_controllers && self.summary.supports_controllers_discarding() && sample.is_controller() {
            return Ok(());
        }
        self.state.sample_count += 1;

        if let Some(key) = self.summary.key_of(sample)? {
            let summary = &self.summary;
            let info = self
                .state
                .entry_or_insert_with(key, sample.is_controller(), |key| summary.new_data(Some(key)));
            summary.update_data(&mut info.data, sample)?;
        }
        if self.summary.include_in_overall(sample) {
            if let Some(overall) = self.state.overall.as_mut() {
                self.summary.update_data(&mut overall.data, sample)?;
            }
        }
        Ok(())
    }
}

impl<S: Summary> SampleConsumer for SummaryConsumer<S> {
    fn core(&self) -> &ConsumerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ConsumerCore {
        &mut self.core
    }

    fn start_consuming(&mut self) -> Result<()> {
        self.state = Self::fresh_state(&self.summary);
        self.core.pass_through_metadata()?;
        self.core.start_producing()
    }

    fn consume(&mut self, sample: &Sample, channel: usize) -> Result<()> {
        self.aggregate(sample)?;
        self.core.produce(sample, channel)
    }

    fn stop_consuming(&mut self) -> Result<()> {
        let data = self.export_data();
        self.core.set_data_to_context(SUMMARY_KEY, data)?;
        info!(
            stage = %self.core.name(),
            samples = self.state.sample_count,
            keys = self.state.items.len(),
            "summary stored"
        );
        debug!(stage = %self.core.name(), key = %self.core.context_key(SUMMARY_KEY), "summary context key");
        self.core.stop_producing()
    }
}
