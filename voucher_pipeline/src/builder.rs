pub use crate::config::*;

/// Assembles a [`Table`] row by row, checking that every row matches the
/// column count.
///
/// Hosts that already hold parsed records should prefer this over pushing
/// into a [`Table`] directly, and tests use it to write fixtures compactly.
///
/// ```
/// use voucher_pipeline::builder::TableBuilder;
/// use voucher_pipeline::Cell;
/// # use voucher_pipeline::CleanError;
///
/// let mut builder = TableBuilder::new(&["client id", "county"]);
/// builder.push_row(vec![Cell::Int(17), Cell::Text("Glos".to_string())])?;
/// builder.push_text_row(&["18", ""])?;
///
/// let table = builder.build();
/// assert_eq!(table.num_rows(), 2);
/// # Ok::<(), CleanError>(())
/// ```
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    pub fn new(columns: &[&str]) -> TableBuilder {
        TableBuilder {
            table: Table::new(columns.iter().map(|c| c.to_string()).collect()),
        }
    }

    /// Adds one row of cells. Fails when the width does not match the
    /// declared columns.
    pub fn push_row(&mut self, cells: Vec<Cell>) -> Result<(), CleanError> {
        self.table.push_row(cells)
    }

    /// Adds one row of raw text values; empty strings become null cells.
    pub fn push_text_row(&mut self, values: &[&str]) -> Result<(), CleanError> {
        let cells = values
            .iter()
            .map(|v| {
                if v.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(v.to_string())
                }
            })
            .collect();
        self.push_row(cells)
    }

    pub fn build(self) -> Table {
        self.table
    }
}
