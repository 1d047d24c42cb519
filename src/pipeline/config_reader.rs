use crate::pipeline::*;

use std::fs;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// The file the report reads from.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// "csv" or "xlsx".
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

/// Optional client journey filters; unset bounds stay open.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct JourneyFilterConfig {
    #[serde(rename = "minVoucherCount")]
    pub min_voucher_count: Option<u32>,
    #[serde(rename = "maxVoucherCount")]
    pub max_voucher_count: Option<u32>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "reportName")]
    pub report_name: String,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    pub source: SourceConfig,
    /// "full" or "slim"; detected from the columns when missing.
    pub schema: Option<String>,
    #[serde(rename = "maxHouseholdSize")]
    pub max_household_size: Option<i64>,
    pub journey: Option<JourneyFilterConfig>,
}

pub fn read_config(path: &str) -> ReportResult<ReportConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})
}

pub fn read_reference(path: &str) -> ReportResult<serde_json::Value> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: serde_json::Value =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
