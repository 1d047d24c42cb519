// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;

/// One value in a tabular voucher export.
///
/// The variants mirror what spreadsheet readers produce: free text, numbers,
/// booleans, dates and blanks. A blank cell is a first class value so that
/// missing data survives the transforms instead of turning into an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Empty,
}

impl Eq for Cell {}

// Floats hash by bit pattern. Whole rows must be hashable for the set-like
// de-duplication pass.
impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Cell::Text(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            Cell::Int(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Cell::Float(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            Cell::Bool(b) => {
                3u8.hash(state);
                b.hash(state);
            }
            Cell::Date(d) => {
                4u8.hash(state);
                d.hash(state);
            }
            Cell::Empty => 5u8.hash(state),
        }
    }
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Integer reading used for the household band counts. Anything that is
    /// not a whole number reads as `None`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Cell::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Truthiness for checkbox-style columns such as the secondary crisis
    /// flags.
    pub fn is_set(&self) -> bool {
        match self {
            Cell::Bool(b) => *b,
            Cell::Int(i) => *i != 0,
            Cell::Float(f) => *f != 0.0,
            Cell::Text(s) => {
                let t = s.trim();
                t.eq_ignore_ascii_case("true") || t.eq_ignore_ascii_case("yes") || t == "1"
            }
            _ => false,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Empty => Ok(()),
        }
    }
}

/// A column-ordered table of cells.
///
/// Every pipeline operation is a pure function from one table (plus
/// parameters) to another; none of them mutate their input.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Table {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column the caller cannot work without.
    pub fn require_column(&self, name: &str) -> Result<usize, CleanError> {
        self.column_index(name).ok_or_else(|| CleanError::MissingColumn {
            column: name.to_string(),
        })
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), CleanError> {
        if row.len() != self.columns.len() {
            return Err(CleanError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// A copy without the named columns. Unknown names are ignored: the
    /// denylists cover more than one export generation.
    pub fn drop_columns(&self, names: &[&str]) -> Table {
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| {
                if names.contains(&c.as_str()) {
                    None
                } else {
                    Some(idx)
                }
            })
            .collect();
        self.select(&keep)
    }

    /// A copy with the listed columns renamed. Names absent from the table
    /// are ignored.
    pub fn rename_columns(&self, renames: &[(&str, &str)]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                renames
                    .iter()
                    .find(|(from, _)| from == c)
                    .map(|(_, to)| to.to_string())
                    .unwrap_or_else(|| c.clone())
            })
            .collect();
        Table {
            columns,
            rows: self.rows.clone(),
        }
    }

    /// A copy with every column name lower-cased.
    pub fn lowercase_columns(&self) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.to_lowercase()).collect(),
            rows: self.rows.clone(),
        }
    }

    fn select(&self, keep: &[usize]) -> Table {
        Table {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }
}

// ********* Configuration **********

/// The export generation a raw table conforms to.
///
/// The two generations are told apart by column presence, not by a version
/// flag: only the wide export still carries the duplicate structural columns
/// from before the 4th April 2023 form change.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ExportSchema {
    /// The wide export with the pre-cutover duplicate columns.
    Full,
    /// The later trimmed export without them.
    Slim,
}

/// The tunable parts of the cleaning pass.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CleanRules {
    /// Rows with a household size at or above this are discarded.
    /// A guard against manual entry errors, not a business limit.
    pub max_household_size: i64,
    /// Force one export generation instead of detecting it from the columns.
    pub schema: Option<ExportSchema>,
    /// The form-change date separating the two reason fields.
    pub cutover_date: NaiveDate,
}

impl Default for CleanRules {
    fn default() -> CleanRules {
        CleanRules {
            max_household_size: 10,
            schema: None,
            cutover_date: NaiveDate::from_ymd_opt(2023, 4, 4).unwrap(),
        }
    }
}

/// Filters for the client journey view. All bounds are inclusive; a missing
/// bound leaves that side open.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct JourneyQuery {
    pub min_voucher_count: Option<u32>,
    pub max_voucher_count: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl JourneyQuery {
    pub const UNBOUNDED: JourneyQuery = JourneyQuery {
        min_voucher_count: None,
        max_voucher_count: None,
        start_date: None,
        end_date: None,
    };
}

/// Selects one client's records for the history view.
///
/// Either the client id or both name fields must be given; name matching is
/// case-insensitive.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ClientQuery {
    pub client_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Sort the history newest first instead of oldest first.
    pub newest_first: bool,
}

// ******** Output data structures *********

/// A contiguous run of records sharing the same reason value, with the
/// ordered dates falling in the run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TimelineSegment {
    pub reason: String,
    pub dates: Vec<NaiveDate>,
}

/// Errors that stop a transform outright.
///
/// Data quality problems are not errors; they are resolved locally by the
/// coercion rules (bad dates and band counts become null/zero, unmatched
/// county spellings fall back to a capitalized value).
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CleanError {
    MissingColumn { column: String },
    RowWidth { expected: usize, actual: usize },
}

impl Error for CleanError {}

impl Display for CleanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanError::MissingColumn { column } => {
                write!(f, "expected column {:?} not found in the input", column)
            }
            CleanError::RowWidth { expected, actual } => {
                write!(f, "row has {} values but the table has {} columns", actual, expected)
            }
        }
    }
}
