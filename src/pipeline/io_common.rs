use std::path::Path;

use calamine::DataType;
use chrono::{Duration, NaiveDate};

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Column names from the header row of a worksheet. A header cell that is
/// not text gets a positional name.
pub fn header_names(header: &[DataType]) -> Vec<String> {
    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| match cell {
            DataType::String(s) => s.trim().to_string(),
            _ => format!("column {}", idx + 1),
        })
        .collect()
}

/// Excel serial day number to a calendar date. The epoch is offset two days
/// to absorb the 1900 leap year quirk inherited from Lotus.
pub fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial as i64))
}
