use super::{percent, Summary, SummaryState};
use crate::error::Result;
use crate::result_tree::ResultData;
use crate::sample::Sample;

/// Succeeded and failed sample counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RequestCounts {
    pub succeeded: u64,
    pub failed: u64,
}

impl RequestCounts {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Overall success versus failure ratio.
///
/// Exports `{"OkPercent", "KoPercent", "Ok", "Ko"}` rather than keyed rows.
#[derive(Debug, Default, Clone)]
pub struct RequestsSummary;

impl RequestsSummary {
    pub fn new() -> Self {
        Self
    }
}

impl Summary for RequestsSummary {
    type Data = RequestCounts;

    fn new_data(&self, _key: Option<&str>) -> RequestCounts {
        RequestCounts::default()
    }

    fn key_of(&self, _sample: &Sample) -> Result<Option<String>> {
        Ok(None)
    }

    fn update_data(&self, data: &mut RequestCounts, sample: &Sample) -> Result<()> {
        if sample.success()? {
            data.succeeded += 1;
        } else {
            data.failed += 1;
        }
        Ok(())
    }

    fn supports_controllers_discarding(&self) -> bool {
        false
    }

    fn titles(&self) -> Vec<String> {
        Vec::new()
    }

    fn data_row(&self, _key: Option<&str>, data: &RequestCounts, _state: &SummaryState<RequestCounts>) -> ResultData {
        let mut row = ResultData::list();
        row.push(data.succeeded);
        row.push(data.failed);
        row
    }

    fn export(&self, state: &SummaryState<RequestCounts>) -> ResultData {
        let counts = state.overall().map(|o| *o.data()).unwrap_or_default();
        let mut result = ResultData::map();
        result.insert("OkPercent", percent(counts.succeeded, counts.total()));
        result.insert("KoPercent", percent(counts.failed, counts.total()));
        result.insert("Ok", counts.succeeded);
        result.insert("Ko", counts.failed);
        result
    }
}
