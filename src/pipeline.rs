use log::{info, warn};

use voucher_pipeline::*;

use snafu::{prelude::*, Snafu};

use std::fs;

use chrono::NaiveDate;
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_xlsx;

use crate::args::Args;
use crate::pipeline::config_reader::*;
use crate::pipeline::io_common::simplify_file_name;

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook has no readable worksheet"))]
    EmptyExcel {},
    #[snafu(display("Cell of an unexpected type on line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading a CSV record"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("{source}"))]
    Cleaning { source: CleanError },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;
pub type BReportResult<T> = Result<T, Box<ReportError>>;

/// Runs one report end to end: read the export, clean it, aggregate the
/// client journeys and emit the JSON summary.
pub fn run_report(args: &Args) -> ReportResult<()> {
    let config = resolve_config(args)?;
    info!("config: {:?}", config);

    let rules = validate_rules(&config)?;
    let query = validate_query(&config)?;

    let raw = read_input(&config)?;
    info!(
        "run_report: raw table with {} rows, {} columns",
        raw.num_rows(),
        raw.num_columns()
    );

    let cleaned = clean_table(&raw, &rules).context(CleaningSnafu {})?;
    let journey = journey_table(&cleaned, &query).context(CleaningSnafu {})?;
    let monthly = monthly_voucher_counts(&cleaned).context(CleaningSnafu {})?;

    let summary = build_summary_js(&config, &cleaned, &journey, &monthly);
    let pretty_js_summary = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;

    let out_path = args.out.clone().or_else(|| {
        config
            .output_settings
            .as_ref()
            .and_then(|o| o.output_path.clone())
    });
    match out_path {
        Some(path) if path != "stdout" => {
            fs::write(&path, &pretty_js_summary).context(WritingOutputSnafu { path })?;
        }
        _ => println!("{}", pretty_js_summary),
    }

    // The reference summary, if provided for comparison.
    if let Some(reference_path) = &args.reference {
        let reference = read_reference(reference_path)?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_summary {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_reference.as_str(),
                pretty_js_summary.as_str(),
                "\n",
            );
            whatever!("Difference detected between the computed summary and the reference summary");
        }
    }

    Ok(())
}

/// Merges the configuration file with the command line flags; the flags
/// win.
fn resolve_config(args: &Args) -> ReportResult<ReportConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => {
            let input = match &args.input {
                Some(path) => path.clone(),
                None => whatever!("either --config or --input must be provided"),
            };
            ReportConfig {
                output_settings: None,
                source: SourceConfig {
                    provider: guess_provider(&input),
                    file_path: input,
                    excel_worksheet_name: None,
                },
                schema: None,
                max_household_size: None,
                journey: None,
            }
        }
    };

    if let Some(input) = &args.input {
        config.source.file_path = input.clone();
        config.source.provider = guess_provider(input);
    }
    if let Some(input_type) = &args.input_type {
        config.source.provider = input_type.clone();
    }
    if let Some(worksheet) = &args.excel_worksheet_name {
        config.source.excel_worksheet_name = Some(worksheet.clone());
    }
    if let Some(schema) = &args.schema {
        config.schema = Some(schema.clone());
    }

    let mut journey = config.journey.clone().unwrap_or_default();
    if let Some(v) = args.min_vouchers {
        journey.min_voucher_count = Some(v);
    }
    if let Some(v) = args.max_vouchers {
        journey.max_voucher_count = Some(v);
    }
    if let Some(date) = &args.start_date {
        journey.start_date = Some(date.clone());
    }
    if let Some(date) = &args.end_date {
        journey.end_date = Some(date.clone());
    }
    config.journey = Some(journey);

    Ok(config)
}

fn guess_provider(path: &str) -> String {
    let lower = path.to_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        "xlsx".to_string()
    } else {
        "csv".to_string()
    }
}

fn validate_rules(config: &ReportConfig) -> ReportResult<CleanRules> {
    let mut rules = CleanRules::default();
    if let Some(max) = config.max_household_size {
        rules.max_household_size = max;
    }
    rules.schema = match config.schema.as_deref() {
        None => None,
        Some("full") => Some(ExportSchema::Full),
        Some("slim") => Some(ExportSchema::Slim),
        Some(x) => {
            whatever!("Unknown schema kind {:?}, expected \"full\" or \"slim\"", x)
        }
    };
    Ok(rules)
}

fn validate_query(config: &ReportConfig) -> ReportResult<JourneyQuery> {
    let mut query = JourneyQuery::UNBOUNDED;
    if let Some(filters) = &config.journey {
        query.min_voucher_count = filters.min_voucher_count;
        query.max_voucher_count = filters.max_voucher_count;
        if let Some(date) = &filters.start_date {
            query.start_date = Some(parse_query_date(date)?);
        }
        if let Some(date) = &filters.end_date {
            query.end_date = Some(parse_query_date(date)?);
        }
    }
    Ok(query)
}

fn parse_query_date(value: &str) -> ReportResult<NaiveDate> {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Ok(date),
        Err(_) => whatever!("Cannot parse date {:?}, expected YYYY-MM-DD", value),
    }
}

fn read_input(config: &ReportConfig) -> ReportResult<Table> {
    let path = config.source.file_path.clone();
    info!("Attempting to read voucher export {:?}", path);
    match config.source.provider.as_str() {
        "xlsx" => io_xlsx::read_excel_table(&config.source).map_err(|e| *e),
        "csv" => io_csv::read_csv_table(&path).map_err(|e| *e),
        x => whatever!("Provider not implemented {:?}", x),
    }
}

fn cell_to_json(cell: &Cell) -> JSValue {
    match cell {
        Cell::Text(s) => json!(s),
        Cell::Int(i) => json!(i),
        Cell::Float(f) => json!(f),
        Cell::Bool(b) => json!(b),
        Cell::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
        Cell::Empty => JSValue::Null,
    }
}

fn table_to_json(table: &Table) -> JSValue {
    let mut rows: Vec<JSValue> = Vec::new();
    for row in table.rows() {
        let mut obj: JSMap<String, JSValue> = JSMap::new();
        for (idx, column) in table.columns().iter().enumerate() {
            obj.insert(column.clone(), cell_to_json(&row[idx]));
        }
        rows.push(JSValue::Object(obj));
    }
    JSValue::Array(rows)
}

fn build_summary_js(
    config: &ReportConfig,
    cleaned: &Table,
    journey: &Option<Table>,
    monthly: &[(String, u64)],
) -> JSValue {
    let report_name = config
        .output_settings
        .as_ref()
        .map(|o| o.report_name.clone())
        .unwrap_or_else(|| simplify_file_name(&config.source.file_path));

    let journey_js = match journey {
        Some(table) => json!({
            "found": true,
            "voucherDetailColumns": table.num_columns() - 5,
            "clients": table_to_json(table),
        }),
        None => json!({ "found": false }),
    };

    let monthly_js: Vec<JSValue> = monthly
        .iter()
        .map(|(month, count)| json!({ "month": month, "vouchers": count }))
        .collect();

    json!({
        "report": report_name,
        "dataset": {
            "rows": cleaned.num_rows(),
            "columns": cleaned.columns(),
        },
        "journey": journey_js,
        "monthlyVoucherCounts": monthly_js,
    })
}
