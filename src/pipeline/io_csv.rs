// Primitives for reading CSV exports.

use log::debug;

use csv::ReaderBuilder;
use snafu::prelude::*;

use voucher_pipeline::{Cell, Table};

use crate::pipeline::*;

/// Reads a whole CSV export into a table. The first record is the header
/// row; every cell comes in as text, with blanks as null. The downstream
/// cleaning stages take care of dates and numbers.
pub fn read_csv_table(path: &str) -> BReportResult<Table> {
    let mut rdr = ReaderBuilder::new()
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let headers = rdr.headers().context(CsvLineParseSnafu {})?.clone();
    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    let mut table = Table::new(columns);

    for record in rdr.into_records() {
        let record = record.context(CsvLineParseSnafu {})?;
        let cells: Vec<Cell> = record.iter().map(text_cell).collect();
        table.push_row(cells).context(CleaningSnafu {})?;
    }
    debug!(
        "read_csv_table: {} rows, {} columns from {:?}",
        table.num_rows(),
        table.num_columns(),
        path
    );
    Ok(table)
}

fn text_cell(value: &str) -> Cell {
    if value.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(value.to_string())
    }
}
