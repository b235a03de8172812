use super::{ratio, Summary, SummaryState, OVERALL_LABEL};
use crate::defaults;
use crate::error::Result;
use crate::result_tree::ResultData;
use crate::sample::Sample;
use std::collections::HashMap;
use std::fmt::Debug;

/// Satisfied and tolerated thresholds in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub satisfied: u64,
    pub tolerated: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            satisfied: defaults::APDEX_SATISFIED_MS,
            tolerated: defaults::APDEX_TOLERATED_MS,
        }
    }
}

/// Chooses the thresholds applied to a label; `None` selects the overall ones
pub trait ThresholdSelector: Send + Sync + Debug {
    fn select(&self, label: Option<&str>) -> Thresholds;
}

/// Same thresholds for every label
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticThresholds(pub Thresholds);

impl ThresholdSelector for StaticThresholds {
    fn select(&self, _label: Option<&str>) -> Thresholds {
        self.0
    }
}

/// Per-label overrides over a fallback
#[derive(Debug, Clone, Default)]
pub struct PerLabelThresholds {
    fallback: Thresholds,
    overrides: HashMap<String, Thresholds>,
}

impl PerLabelThresholds {
    pub fn new(fallback: Thresholds) -> Self {
        Self {
            fallback,
            overrides: HashMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>, thresholds: Thresholds) -> Self {
        self.overrides.insert(label.into(), thresholds);
        self
    }
}

impl ThresholdSelector for PerLabelThresholds {
    fn select(&self, label: Option<&str>) -> Thresholds {
        label
            .and_then(|l| self.overrides.get(l))
            .copied()
            .unwrap_or(self.fallback)
    }
}

/// `(satisfied + tolerated / 2) / total`, or `0.0` without samples
pub fn apdex(satisfied: u64, tolerated: u64, total: u64) -> f64 {
    ratio(satisfied as f64 + tolerated as f64 / 2.0, total as f64)
}

#[derive(Debug, Clone)]
pub struct ApdexData {
    thresholds: Thresholds,
    satisfied: u64,
    tolerated: u64,
    total: u64,
}

impl ApdexData {
    pub fn apdex(&self) -> f64 {
        apdex(self.satisfied, self.tolerated, self.total)
    }
}

/// Application performance index per label.
///
/// Every sample counts toward the total; only successful samples can be
/// satisfied or tolerated.
#[derive(Debug)]
pub struct ApdexSummary {
    selector: Box<dyn ThresholdSelector>,
}

impl ApdexSummary {
    pub fn new(selector: Box<dyn ThresholdSelector>) -> Self {
        Self { selector }
    }
}

impl Summary for ApdexSummary {
    type Data = ApdexData;

    fn new_data(&self, key: Option<&str>) -> ApdexData {
        ApdexData {
            thresholds: self.selector.select(key),
            satisfied: 0,
            tolerated: 0,
            total: 0,
        }
    }

    fn update_data(&self, data: &mut ApdexData, sample: &Sample) -> Result<()> {
        data.total += 1;
        if sample.success()? {
            let elapsed = sample.elapsed_time()?.max(0) as u64;
            if elapsed <= data.thresholds.satisfied {
                data.satisfied += 1;
            } else if elapsed <= data.thresholds.tolerated {
                data.tolerated += 1;
            }
        }
        Ok(())
    }

    fn titles(&self) -> Vec<String> {
        ["Apdex", "T (Toleration threshold)", "F (Frustration threshold)", "Label"]
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    fn data_row(&self, key: Option<&str>, data: &ApdexData, _state: &SummaryState<ApdexData>) -> ResultData {
        let mut row = ResultData::list();
        row.push(data.apdex());
        row.push(data.thresholds.satisfied);
        row.push(data.thresholds.tolerated);
        row.push(key.unwrap_or(OVERALL_LABEL));
        row
    }
}
