// Primitives for reading plain (unprotected) Excel exports.

use log::debug;

use calamine::{open_workbook, DataType, Reader, Xlsx};
use snafu::prelude::*;

use voucher_pipeline::{Cell, Table};

use crate::pipeline::io_common::{excel_serial_date, header_names};
use crate::pipeline::*;

/// Reads the voucher worksheet of an Excel export into a table. The first
/// row is the header row; date-formatted cells become dates, everything
/// else keeps its spreadsheet type.
pub fn read_excel_table(source: &SourceConfig) -> BReportResult<Table> {
    let wrange = get_range(&source.file_path, source.excel_worksheet_name.as_deref())?;

    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu {})?;
    debug!("read_excel_table: header: {:?}", header);

    let mut table = Table::new(header_names(header));
    for (idx, row) in rows.enumerate() {
        let mut cells: Vec<Cell> = Vec::with_capacity(table.num_columns());
        for elt in row.iter().take(table.num_columns()) {
            cells.push(read_cell(elt, (idx + 2) as u64)?);
        }
        // Short rows happen when the trailing cells are blank.
        while cells.len() < table.num_columns() {
            cells.push(Cell::Empty);
        }
        table.push_row(cells).context(CleaningSnafu {})?;
    }
    debug!(
        "read_excel_table: {} rows, {} columns from {:?}",
        table.num_rows(),
        table.num_columns(),
        source.file_path
    );
    Ok(table)
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> BReportResult<calamine::Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it. Otherwise take the first one.
    if let Some(name) = worksheet_name {
        let wrange = workbook
            .worksheet_range(name)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let wrange = workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    }
}

fn read_cell(cell: &DataType, lineno: u64) -> ReportResult<Cell> {
    match cell {
        DataType::String(s) if s.trim().is_empty() => Ok(Cell::Empty),
        DataType::String(s) => Ok(Cell::Text(s.clone())),
        DataType::Int(i) => Ok(Cell::Int(*i)),
        DataType::Float(f) => Ok(Cell::Float(*f)),
        DataType::Bool(b) => Ok(Cell::Bool(*b)),
        DataType::DateTime(serial) => Ok(match excel_serial_date(*serial) {
            Some(date) => Cell::Date(date),
            None => Cell::Empty,
        }),
        // A cell-level error reads as a blank, in line with the permissive
        // value policy.
        DataType::Error(_) => Ok(Cell::Empty),
        DataType::Empty => Ok(Cell::Empty),
        _ => Err(ReportError::ExcelWrongCellType {
            lineno,
            content: format!("{:?}", cell),
        }),
    }
}
