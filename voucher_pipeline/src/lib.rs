mod config;
mod journey;
mod summary;
pub mod builder;
pub mod manual;

use log::{debug, info};

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

pub use crate::config::*;
pub use crate::journey::{client_history, journey_table, reason_timeline};
pub use crate::summary::{
    monthly_voucher_counts, referral_reason_values, secondary_crisis_counts, value_counts,
};

// **** Column tables ****

// Canonical (lower-case) names used by the transforms downstream of the
// schema projection.
pub(crate) const CLIENT_ID_COL: &str = "client id";
pub(crate) const CREATED_COL: &str = "created at";
pub(crate) const ISSUE_DATE_COL: &str = "date issued to client";
pub(crate) const FULFILLED_COL: &str = "fulfilled date";
pub(crate) const FIRST_NAME_COL: &str = "first name";
pub(crate) const LAST_NAME_COL: &str = "last name";
pub(crate) const ISSUED_BY_COL: &str = "issued by";
pub(crate) const CRISIS_COL: &str = "crisis type";
pub(crate) const REFERRAL_COL: &str = "reasons for referral";
pub(crate) const HOUSEHOLD_COL: &str = "household_size";
pub(crate) const MONTH_COL: &str = "month-year";
pub(crate) const REASON_COL: &str = "reason";

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const UNKNOWN: &str = "Unknown";

/// Columns every export generation must provide. Their absence is a schema
/// mismatch, not a data quality problem.
const REQUIRED_COLUMNS: [&str; 12] = [
    "Client ID",
    "Created at",
    "Date issued to client",
    "Fulfilled date",
    "First name",
    "Last name",
    "Address1",
    "Address2",
    "Town",
    "County",
    "Crisis type",
    "Issued by",
];

/// Long household band headers renamed to short band labels, in band order.
/// The first ten cleaned band columns are derived from these.
const BAND_RENAMES: [(&str, &str); 10] = [
    ("The usual household structure: Children (0 - 4 yrs)", "0-4"),
    ("The usual household structure: Children (5 - 11 yrs)", "5-11"),
    ("The usual household structure: Children (12 - 16 yrs)", "12-16"),
    ("The usual household structure: Adults (17 - 24 yrs)", "17-24"),
    ("The usual household structure: Adults (25 - 34 yrs)", "25-34"),
    ("The usual household structure: Adults (35 - 44 yrs)", "35-44"),
    ("The usual household structure: Adults (45 - 54 yrs)", "45-54"),
    ("The usual household structure: Adults (55 - 64 yrs)", "55-64"),
    ("The usual household structure: Adults (65 - 74 yrs)", "65-74"),
    ("The usual household structure: Adults (75+ yrs)", "75+"),
];

/// Bands merged into wider ones after the household sum.
const MERGED_BANDS: [(&str, &str, &str); 2] = [("45-64", "45-54", "55-64"), ("65+", "65-74", "75+")];

/// The "age not given" headcounts. Dropped after the household sum.
const UNSPECIFIED_BAND_COLUMNS: [&str; 2] = [
    "the usual household structure: children (not specified)",
    "the usual household structure: adults (not specified)",
];

/// Columns never carried into the cleaned table, whichever generation
/// produced them: contact details, free-text notes and internal flags.
const DROP_COLUMNS_COMMON: [&str; 11] = [
    "Red",
    "Emergency food box",
    "Printable",
    "Client email address",
    "Client phone number",
    "Dietary requirements",
    "Reasons for referral - notes",
    "Agency contact phone",
    "Notes regarding parcel requirements",
    "Collection/Delivery notes",
    "Reason for needing more than 3 vouchers in the last 6 months - notes",
];

/// Additional columns only dropped from the wide export: tracking state,
/// consent flags, free-text crisis descriptions and the per-voucher
/// headcounts superseded by the household structure bands. The pre-cutover
/// duplicate columns are recognized by their label rather than enumerated.
const DROP_COLUMNS_FULL: [&str; 26] = [
    "Voucher code",
    "Signposted date",
    "Parcel days",
    "Crisis cause",
    "Crisis sub cause",
    "Crisis cause description",
    "Source of income",
    "Consent for contacting about delivery or collection",
    "Consent for holding information about dietary requirements",
    "Reason for needing more than 3 vouchers in the last 6 months",
    "Partner or spouse (usual household structure)",
    "Parent or carer (usual household structure)",
    "Partner or spouse (number of people the voucher is for)",
    "Parent or carer (number of people the voucher is for)",
    "Number of people the voucher is for: Children (0 - 4 yrs)",
    "Number of people the voucher is for: Children (5 - 11 yrs)",
    "Number of people the voucher is for: Children (12 - 16 yrs)",
    "Number of people the voucher is for: Children (not specified)",
    "Number of people the voucher is for: Adults (17 - 24 yrs)",
    "Number of people the voucher is for: Adults (25 - 34 yrs)",
    "Number of people the voucher is for: Adults (35 - 44 yrs)",
    "Number of people the voucher is for: Adults (45 - 54 yrs)",
    "Number of people the voucher is for: Adults (55 - 64 yrs)",
    "Number of people the voucher is for: Adults (65 - 74 yrs)",
    "Number of people the voucher is for: Adults (75+ yrs)",
    "Number of people the voucher is for: Adults (not specified)",
];

/// Marker carried by every pre-cutover duplicate column, compared
/// case-insensitively.
const PRE_CUTOVER_MARKER: &str = "pre 4th april 2023";

/// Fields trimmed of surrounding whitespace.
const STRIP_COLUMNS: [&str; 6] = [
    FIRST_NAME_COL,
    LAST_NAME_COL,
    "address1",
    "address2",
    "town",
    "county",
];

/// Name and address fields written with the first letter of every word
/// capitalized.
const TITLE_COLUMNS: [&str; 5] = [
    FIRST_NAME_COL,
    LAST_NAME_COL,
    "address1",
    "address2",
    ISSUED_BY_COL,
];

/// Date fields parsed by the temporal pass.
const DATE_COLUMNS: [&str; 3] = [CREATED_COL, ISSUE_DATE_COL, FULFILLED_COL];

// **** County rule tables ****

const GLOUCESTERSHIRE: &str = "Gloucestershire";

/// Known hand-typed county variants pinned to the canonical name. This
/// table always fires before the pattern rules below, so the entries here
/// never fall through to a pattern.
const COUNTY_OVERRIDES: [&str; 13] = [
    "Gl",
    "Gloucester",
    "Glos",
    "Glos.",
    "Glouces",
    "Glouchester",
    "GloucestershirG",
    "Gloucestershrie",
    "Gloucestershirg",
    "Gloustershire",
    "Gloucetershire",
    "Gloucs",
    "Glouctestershire",
];

/// Catch-all rules for county spellings the override table does not
/// anticipate. Evaluated in order, first match wins; every pattern anchors
/// at the start of the lower-cased value only, so `gl\d*` deliberately
/// accepts a bare `gl` prefix.
static COUNTY_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"^glou", GLOUCESTERSHIRE),
        (r"^gl\d*", GLOUCESTERSHIRE),
        (r"^wilt", "Wiltshire"),
        (r"^oxon", "Oxfordshire"),
        (r"^cots", "Cotswolds"),
        (r"^swindon", "Swindon"),
        (r"^sn\d*", "Swindon"),
        (r"^norfolk", "Norfolk"),
    ]
    .iter()
    .map(|(pattern, name)| (Regex::new(pattern).unwrap(), *name))
    .collect()
});

/// An embedded UK postcode, e.g. `GL7 1AB`, with its optional leading space.
static POSTCODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s?[A-Z]{1,2}\d{1,2}\s?\d[A-Z]{2}").unwrap());

// **** Cleaning pipeline ****

/// Runs the whole cleaning pass over a raw voucher export and returns the
/// analysis-ready table: lower-case column names, canonical county and
/// crisis values, parsed dates, derived household size and month bucket,
/// duplicate rows removed.
///
/// The input is not mutated. The only hard failure is a missing required
/// column; all value-level problems are resolved by coercion.
pub fn clean_table(raw: &Table, rules: &CleanRules) -> Result<Table, CleanError> {
    let schema = rules.schema.unwrap_or_else(|| detect_schema(raw));
    info!(
        "clean_table: {} rows, {} columns, schema {:?}",
        raw.num_rows(),
        raw.num_columns(),
        schema
    );

    let projected = project_schema(raw, schema)?;
    let blanked = blank_empty_text(&projected);
    let households = aggregate_households(&blanked, rules)?;
    debug!(
        "clean_table: {} rows after the household size filter",
        households.num_rows()
    );
    let canonical = canonicalize_text(&households)?;
    let dated = normalize_dates(&canonical)?;
    let deduped = drop_duplicate_rows(&dated);
    info!("clean_table: {} rows retained", deduped.num_rows());
    Ok(deduped)
}

/// Tells the export generations apart by column presence: only the wide
/// export still carries the pre-cutover duplicate columns.
pub fn detect_schema(raw: &Table) -> ExportSchema {
    let has_pre_cutover = raw
        .columns()
        .iter()
        .any(|c| c.to_lowercase().contains(PRE_CUTOVER_MARKER));
    if has_pre_cutover {
        ExportSchema::Full
    } else {
        ExportSchema::Slim
    }
}

/// Projects a raw export onto the canonical column set: checks the required
/// columns, drops the generation's denylist, renames the band headers to
/// short labels and lower-cases everything that remains.
pub fn project_schema(raw: &Table, schema: ExportSchema) -> Result<Table, CleanError> {
    for column in REQUIRED_COLUMNS {
        raw.require_column(column)?;
    }
    for (long, _) in BAND_RENAMES {
        raw.require_column(long)?;
    }

    let mut dropped: Vec<&str> = DROP_COLUMNS_COMMON.to_vec();
    if schema == ExportSchema::Full {
        dropped.extend(DROP_COLUMNS_FULL);
    }
    let mut table = raw.drop_columns(&dropped);

    if schema == ExportSchema::Full {
        let pre_cutover: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| c.to_lowercase().contains(PRE_CUTOVER_MARKER))
            .cloned()
            .collect();
        let pre_cutover_refs: Vec<&str> = pre_cutover.iter().map(|s| s.as_str()).collect();
        table = table.drop_columns(&pre_cutover_refs);
    }

    Ok(table.rename_columns(&BAND_RENAMES).lowercase_columns())
}

/// Empty and whitespace-only text cells become null.
fn blank_empty_text(table: &Table) -> Table {
    let mut out = Table::new(table.columns().to_vec());
    for row in table.rows() {
        let cells = row
            .iter()
            .map(|cell| match cell {
                Cell::Text(s) if s.trim().is_empty() => Cell::Empty,
                other => other.clone(),
            })
            .collect();
        // Arity is preserved by construction.
        let _ = out.push_row(cells);
    }
    out
}

/// Derives the household size, merges the upper age bands and discards rows
/// whose household size clears the entry-error threshold.
pub fn aggregate_households(table: &Table, rules: &CleanRules) -> Result<Table, CleanError> {
    let band_indexes: Vec<usize> = BAND_RENAMES
        .iter()
        .map(|(_, short)| table.require_column(short))
        .collect::<Result<Vec<usize>, CleanError>>()?;

    // The four merge sources and the two unspecified bands disappear from
    // the output; the merged bands and the household size are appended.
    let mut removed: Vec<&str> = Vec::new();
    for (_, low, high) in MERGED_BANDS {
        removed.push(low);
        removed.push(high);
    }
    removed.extend(UNSPECIFIED_BAND_COLUMNS);

    let kept: Vec<usize> = (0..table.num_columns())
        .filter(|&idx| !removed.contains(&table.columns()[idx].as_str()))
        .collect();

    let mut columns: Vec<String> = kept.iter().map(|&i| table.columns()[i].clone()).collect();
    for (merged, _, _) in MERGED_BANDS {
        columns.push(merged.to_string());
    }
    columns.push(HOUSEHOLD_COL.to_string());

    let band_value = |row: &[Cell], band: &str| -> i64 {
        table
            .column_index(band)
            .and_then(|idx| row[idx].as_int())
            .unwrap_or(0)
    };

    let mut out = Table::new(columns);
    for row in table.rows() {
        let household_size: i64 = band_indexes
            .iter()
            .map(|&idx| row[idx].as_int().unwrap_or(0))
            .sum();
        if household_size >= rules.max_household_size {
            debug!(
                "aggregate_households: dropping row with household size {}",
                household_size
            );
            continue;
        }

        let mut cells: Vec<Cell> = Vec::with_capacity(out.num_columns());
        for &idx in &kept {
            // Band counts become integers; everything else passes through.
            if band_indexes.contains(&idx) {
                cells.push(Cell::Int(row[idx].as_int().unwrap_or(0)));
            } else {
                cells.push(row[idx].clone());
            }
        }
        for (_, low, high) in MERGED_BANDS {
            cells.push(Cell::Int(band_value(row, low) + band_value(row, high)));
        }
        cells.push(Cell::Int(household_size));
        out.push_row(cells)?;
    }
    Ok(out)
}

/// Trims and cases the free-text fields, canonicalizes the county and fills
/// the crisis type.
pub fn canonicalize_text(table: &Table) -> Result<Table, CleanError> {
    let strip_indexes: Vec<usize> = STRIP_COLUMNS
        .iter()
        .map(|c| table.require_column(c))
        .collect::<Result<Vec<usize>, CleanError>>()?;
    let title_indexes: Vec<usize> = TITLE_COLUMNS
        .iter()
        .map(|c| table.require_column(c))
        .collect::<Result<Vec<usize>, CleanError>>()?;
    let town_index = table.require_column("town")?;
    let county_index = table.require_column("county")?;
    let crisis_index = table.require_column(CRISIS_COL)?;

    let mut out = Table::new(table.columns().to_vec());
    for row in table.rows() {
        let mut cells = row.to_vec();

        for &idx in &strip_indexes {
            if let Cell::Text(s) = &cells[idx] {
                let trimmed = s.trim();
                cells[idx] = if trimmed.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(trimmed.to_string())
                };
            }
        }
        for &idx in &title_indexes {
            if let Cell::Text(s) = &cells[idx] {
                cells[idx] = Cell::Text(title_case(s.trim()));
            }
        }
        if let Cell::Text(s) = &cells[town_index] {
            // Trailing periods are abbreviation artifacts ("Ciren.").
            let town = s.trim_end_matches('.');
            cells[town_index] = if town.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(town.to_string())
            };
        }

        let county = canonicalize_county(cells[county_index].as_text());
        cells[county_index] = Cell::Text(county);

        if cells[crisis_index].is_empty() {
            cells[crisis_index] = Cell::Text(UNKNOWN.to_string());
        }

        out.push_row(cells)?;
    }
    Ok(out)
}

/// Normalizes one raw county value to its canonical region name.
///
/// The stages are order-sensitive: the exact override table pins known
/// misspellings before the pattern rules see them, then an embedded postcode
/// is stripped, then the ordered pattern rules run over the lower-cased
/// value. A value nothing matches is returned with only its first letter
/// capitalized; a null or empty value becomes `Unknown`.
pub fn canonicalize_county(raw: Option<&str>) -> String {
    let value = match raw {
        Some(v) => v.trim(),
        None => return UNKNOWN.to_string(),
    };
    if value.is_empty() {
        return UNKNOWN.to_string();
    }

    if COUNTY_OVERRIDES.contains(&value) {
        return GLOUCESTERSHIRE.to_string();
    }

    let without_postcode = POSTCODE_PATTERN.replace_all(value, "").to_string();
    let stripped = without_postcode.trim();
    if stripped.is_empty() {
        return UNKNOWN.to_string();
    }

    let lower = stripped.to_lowercase();
    for (pattern, canonical) in COUNTY_PATTERNS.iter() {
        if pattern.is_match(&lower) {
            return (*canonical).to_string();
        }
    }

    capitalize_first(&lower)
}

/// Parses the date columns, tolerating unparsable values, and derives the
/// month bucket used for time series grouping.
pub fn normalize_dates(table: &Table) -> Result<Table, CleanError> {
    let date_indexes: Vec<usize> = DATE_COLUMNS
        .iter()
        .map(|c| table.require_column(c))
        .collect::<Result<Vec<usize>, CleanError>>()?;
    let issue_index = table.require_column(ISSUE_DATE_COL)?;

    let mut columns = table.columns().to_vec();
    columns.push(MONTH_COL.to_string());

    let mut out = Table::new(columns);
    for row in table.rows() {
        let mut cells = row.to_vec();
        for &idx in &date_indexes {
            cells[idx] = parse_date_cell(&cells[idx]);
        }
        let month = match cells[issue_index] {
            Cell::Date(d) => Cell::Text(d.format("%Y-%m").to_string()),
            _ => Cell::Empty,
        };
        cells.push(month);
        out.push_row(cells)?;
    }
    Ok(out)
}

/// Permissive date reading: anything unparsable becomes a null cell, never
/// an error.
pub fn parse_date_cell(cell: &Cell) -> Cell {
    match cell {
        Cell::Date(d) => Cell::Date(*d),
        Cell::Text(s) => match parse_date_text(s) {
            Some(d) => Cell::Date(d),
            None => Cell::Empty,
        },
        _ => Cell::Empty,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let t = s.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, format) {
            return Some(dt.date());
        }
    }
    for format in [DATE_FORMAT, "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, format) {
            return Some(d);
        }
    }
    None
}

/// Removes rows whose cells are all identical, keeping the first occurrence.
fn drop_duplicate_rows(table: &Table) -> Table {
    let mut seen: HashSet<Vec<Cell>> = HashSet::new();
    let mut out = Table::new(table.columns().to_vec());
    for row in table.rows() {
        if seen.insert(row.clone()) {
            // Arity is preserved by construction.
            let _ = out.push_row(row.clone());
        }
    }
    out
}

/// Capitalizes the first letter of every word, lower-casing the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alphabetic = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alphabetic {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alphabetic = true;
        } else {
            out.push(ch);
            prev_alphabetic = false;
        }
    }
    out
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableBuilder;

    // A slim-generation fixture: the required columns, the band columns and
    // one denylisted column that must disappear.
    fn fixture_columns() -> Vec<&'static str> {
        let mut columns = vec![
            "Client ID",
            "Created at",
            "Date issued to client",
            "Fulfilled date",
            "First name",
            "Last name",
            "Address1",
            "Address2",
            "Town",
            "County",
            "Crisis type",
            "Issued by",
            "Agency",
            "Birth year",
            "Reasons for referral",
            "Client email address",
        ];
        for (long, _) in BAND_RENAMES {
            columns.push(long);
        }
        columns.extend([
            "The usual household structure: Children (not specified)",
            "The usual household structure: Adults (not specified)",
        ]);
        columns
    }

    struct FixtureRow {
        client_id: i64,
        issued: &'static str,
        first_name: &'static str,
        last_name: &'static str,
        town: &'static str,
        county: &'static str,
        crisis: &'static str,
        bands: [i64; 10],
    }

    impl Default for FixtureRow {
        fn default() -> FixtureRow {
            FixtureRow {
                client_id: 17,
                issued: "2023-05-06",
                first_name: "anna",
                last_name: "smith",
                town: "Cirencester",
                county: "Gloucestershire",
                crisis: "Benefit delays",
                bands: [1, 0, 0, 1, 0, 0, 0, 0, 0, 0],
            }
        }
    }

    fn push_fixture_row(builder: &mut TableBuilder, row: &FixtureRow) {
        let mut cells = vec![
            Cell::Int(row.client_id),
            Cell::Text(format!("{} 09:30:00", row.issued)),
            Cell::Text(row.issued.to_string()),
            Cell::Text(row.issued.to_string()),
            Cell::Text(row.first_name.to_string()),
            Cell::Text(row.last_name.to_string()),
            Cell::Text("1 Sheep Street".to_string()),
            Cell::Empty,
            Cell::Text(row.town.to_string()),
            Cell::Text(row.county.to_string()),
            Cell::Text(row.crisis.to_string()),
            Cell::Text("cirencester foodbank".to_string()),
            Cell::Text("Citizens Advice".to_string()),
            Cell::Int(1980),
            Cell::Text("Low income".to_string()),
            Cell::Text("someone@example.com".to_string()),
        ];
        for count in row.bands {
            cells.push(Cell::Int(count));
        }
        cells.push(Cell::Int(0));
        cells.push(Cell::Int(0));
        builder.push_row(cells).unwrap();
    }

    fn fixture_table(rows: &[FixtureRow]) -> Table {
        let mut builder = TableBuilder::new(&fixture_columns());
        for row in rows {
            push_fixture_row(&mut builder, row);
        }
        builder.build()
    }

    fn cell<'a>(table: &'a Table, row: usize, column: &str) -> &'a Cell {
        let idx = table.column_index(column).unwrap();
        &table.rows()[row][idx]
    }

    #[test]
    fn detects_the_export_generation_from_the_columns() {
        let slim = fixture_table(&[]);
        assert_eq!(detect_schema(&slim), ExportSchema::Slim);

        let mut columns = fixture_columns();
        columns.push("The usual household structure pre 4th April 2023: Children (0 - 4 yrs)");
        let full = TableBuilder::new(&columns).build();
        assert_eq!(detect_schema(&full), ExportSchema::Full);
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let raw = fixture_table(&[FixtureRow::default()]);
        let broken = raw.drop_columns(&["County"]);
        let res = clean_table(&broken, &CleanRules::default());
        assert_eq!(
            res,
            Err(CleanError::MissingColumn {
                column: "County".to_string()
            })
        );
    }

    #[test]
    fn projection_drops_renames_and_lowercases() {
        let raw = fixture_table(&[FixtureRow::default()]);
        let cleaned = clean_table(&raw, &CleanRules::default()).unwrap();

        assert!(cleaned.column_index("client email address").is_none());
        assert!(cleaned.column_index("0-4").is_some());
        assert!(cleaned.column_index(CLIENT_ID_COL).is_some());
        // Every column name is lower-case.
        for column in cleaned.columns() {
            assert_eq!(column, &column.to_lowercase());
        }
    }

    #[test]
    fn household_size_sums_the_bands_and_merges_the_upper_ones() {
        let raw = fixture_table(&[FixtureRow {
            bands: [1, 0, 0, 1, 0, 0, 1, 1, 1, 1],
            ..FixtureRow::default()
        }]);
        let cleaned = clean_table(&raw, &CleanRules::default()).unwrap();

        assert_eq!(cell(&cleaned, 0, HOUSEHOLD_COL), &Cell::Int(6));
        assert_eq!(cell(&cleaned, 0, "45-64"), &Cell::Int(2));
        assert_eq!(cell(&cleaned, 0, "65+"), &Cell::Int(2));
        for gone in ["45-54", "55-64", "65-74", "75+"] {
            assert!(cleaned.column_index(gone).is_none());
        }
        for gone in UNSPECIFIED_BAND_COLUMNS {
            assert!(cleaned.column_index(gone).is_none());
        }
    }

    #[test]
    fn oversized_households_are_discarded() {
        let raw = fixture_table(&[
            FixtureRow {
                client_id: 1,
                bands: [1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
                ..FixtureRow::default()
            },
            FixtureRow {
                client_id: 2,
                bands: [1, 1, 1, 1, 1, 1, 1, 1, 1, 0],
                ..FixtureRow::default()
            },
        ]);
        let cleaned = clean_table(&raw, &CleanRules::default()).unwrap();
        assert_eq!(cleaned.num_rows(), 1);
        assert_eq!(cell(&cleaned, 0, CLIENT_ID_COL), &Cell::Int(2));
        assert_eq!(cell(&cleaned, 0, HOUSEHOLD_COL), &Cell::Int(9));
    }

    #[test]
    fn names_are_trimmed_and_title_cased() {
        let raw = fixture_table(&[FixtureRow {
            first_name: "  anna MARIA ",
            last_name: "o'neil",
            ..FixtureRow::default()
        }]);
        let cleaned = clean_table(&raw, &CleanRules::default()).unwrap();
        assert_eq!(
            cell(&cleaned, 0, FIRST_NAME_COL),
            &Cell::Text("Anna Maria".to_string())
        );
        assert_eq!(
            cell(&cleaned, 0, LAST_NAME_COL),
            &Cell::Text("O'Neil".to_string())
        );
        assert_eq!(
            cell(&cleaned, 0, ISSUED_BY_COL),
            &Cell::Text("Cirencester Foodbank".to_string())
        );
    }

    #[test]
    fn town_loses_trailing_periods() {
        let raw = fixture_table(&[FixtureRow {
            town: "Ciren.",
            ..FixtureRow::default()
        }]);
        let cleaned = clean_table(&raw, &CleanRules::default()).unwrap();
        assert_eq!(cell(&cleaned, 0, "town"), &Cell::Text("Ciren".to_string()));
    }

    #[test]
    fn missing_crisis_type_becomes_unknown() {
        let raw = fixture_table(&[FixtureRow {
            crisis: "",
            ..FixtureRow::default()
        }]);
        let cleaned = clean_table(&raw, &CleanRules::default()).unwrap();
        assert_eq!(
            cell(&cleaned, 0, CRISIS_COL),
            &Cell::Text(UNKNOWN.to_string())
        );
    }

    #[test]
    fn dates_parse_permissively_and_derive_the_month_bucket() {
        let raw = fixture_table(&[
            FixtureRow {
                issued: "2023-05-06",
                ..FixtureRow::default()
            },
            FixtureRow {
                client_id: 18,
                issued: "not a date",
                ..FixtureRow::default()
            },
        ]);
        let cleaned = clean_table(&raw, &CleanRules::default()).unwrap();
        assert_eq!(
            cell(&cleaned, 0, ISSUE_DATE_COL),
            &Cell::Date(NaiveDate::from_ymd_opt(2023, 5, 6).unwrap())
        );
        assert_eq!(
            cell(&cleaned, 0, MONTH_COL),
            &Cell::Text("2023-05".to_string())
        );
        assert_eq!(cell(&cleaned, 1, ISSUE_DATE_COL), &Cell::Empty);
        assert_eq!(cell(&cleaned, 1, MONTH_COL), &Cell::Empty);
    }

    #[test]
    fn duplicate_rows_are_removed_once() {
        let raw = fixture_table(&[
            FixtureRow::default(),
            FixtureRow {
                client_id: 18,
                ..FixtureRow::default()
            },
            FixtureRow::default(),
        ]);
        let cleaned = clean_table(&raw, &CleanRules::default()).unwrap();
        assert_eq!(cleaned.num_rows(), 2);
    }

    #[test]
    fn county_overrides_pin_known_misspellings() {
        for variant in COUNTY_OVERRIDES {
            assert_eq!(canonicalize_county(Some(variant)), GLOUCESTERSHIRE);
        }
    }

    #[test]
    fn county_postcode_fragments_are_stripped() {
        assert_eq!(
            canonicalize_county(Some("Gloucestershire GL7 1AB")),
            GLOUCESTERSHIRE
        );
        // Nothing but a postcode degrades to the sentinel.
        assert_eq!(canonicalize_county(Some("GL7 1AB")), UNKNOWN);
    }

    #[test]
    fn county_pattern_rules_match_prefixes_in_order() {
        assert_eq!(canonicalize_county(Some("wiltshire")), "Wiltshire");
        assert_eq!(canonicalize_county(Some("OXON")), "Oxfordshire");
        assert_eq!(canonicalize_county(Some("cotswold area")), "Cotswolds");
        assert_eq!(canonicalize_county(Some("sn25")), "Swindon");
        assert_eq!(canonicalize_county(Some("gl2")), GLOUCESTERSHIRE);
        assert_eq!(canonicalize_county(Some("Norfolk (Norwich)")), "Norfolk");
    }

    #[test]
    fn county_fallback_capitalizes_unmatched_values() {
        assert_eq!(canonicalize_county(Some("somerset")), "Somerset");
        assert_eq!(canonicalize_county(Some("WEST midlands")), "West midlands");
    }

    #[test]
    fn county_normalization_is_idempotent() {
        for value in ["Glos.", "Gloucestershire GL7 1AB", "wilts", "somerset", ""] {
            let once = canonicalize_county(Some(value));
            let twice = canonicalize_county(Some(&once));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn county_null_and_empty_become_unknown() {
        assert_eq!(canonicalize_county(None), UNKNOWN);
        assert_eq!(canonicalize_county(Some("   ")), UNKNOWN);
    }

    #[test]
    fn full_export_loses_the_pre_cutover_duplicates() {
        let mut columns = fixture_columns();
        columns.push("The usual household structure pre 4th April 2023: Children (0 - 4 yrs)");
        columns.push("Number of people the voucher is for: Adults (75+ yrs)");
        let base = fixture_table(&[FixtureRow::default()]);
        let mut cells = base.rows()[0].clone();
        cells.push(Cell::Int(1));
        cells.push(Cell::Int(1));
        let mut builder = TableBuilder::new(&columns);
        builder.push_row(cells).unwrap();

        let cleaned = clean_table(&builder.build(), &CleanRules::default()).unwrap();
        for column in cleaned.columns() {
            assert!(!column.contains(PRE_CUTOVER_MARKER));
            assert!(!column.starts_with("number of people"));
        }
    }
}
