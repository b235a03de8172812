use super::{percent, Summary, SummaryState};
use crate::error::Result;
use crate::result_tree::ResultData;
use crate::sample::Sample;

/// Key reported for failed samples whose response code is `200`
pub const ASSERTION_FAILED: &str = "Assertion failed";

/// Error key of a failed sample: its response code, with `200` reported as
/// an assertion failure.
pub fn error_key(sample: &Sample) -> Result<String> {
    let code = sample.response_code()?;
    Ok(if code == "200" {
        ASSERTION_FAILED.to_string()
    } else {
        code.to_string()
    })
}

/// Failure counts per error key.
///
/// Percentages are reported against every error and against every sample
/// seen by the stage. There is no overall row.
#[derive(Debug, Default, Clone)]
pub struct ErrorsSummary;

impl ErrorsSummary {
    pub fn new() -> Self {
        Self
    }
}

impl Summary for ErrorsSummary {
    type Data = u64;

    fn new_data(&self, _key: Option<&str>) -> u64 {
        0
    }

    fn key_of(&self, sample: &Sample) -> Result<Option<String>> {
        if sample.success()? {
            Ok(None)
        } else {
            error_key(sample).map(Some)
        }
    }

    fn update_data(&self, data: &mut u64, _sample: &Sample) -> Result<()> {
        *data += 1;
        Ok(())
    }

    fn has_overall(&self) -> bool {
        false
    }

    fn supports_controllers_discarding(&self) -> bool {
        false
    }

    fn titles(&self) -> Vec<String> {
        ["Type of error", "Number of errors", "% in errors", "% in all samples"]
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    fn data_row(&self, key: Option<&str>, data: &u64, state: &SummaryState<u64>) -> ResultData {
        let errors: u64 = state.items().map(|(_, info)| *info.data()).sum();
        let mut row = ResultData::list();
        row.push(key.unwrap_or_default());
        row.push(*data);
        row.push(percent(*data, errors));
        row.push(percent(*data, state.sample_count()));
        row
    }
}
