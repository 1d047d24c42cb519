use clap::Parser;

/// Cleans a food bank voucher export and reports per-client journeys.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON description of the report to run: the
    /// source file, the export generation, the household size threshold and
    /// the journey filters. Command line flags override it.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, vjourney
    /// will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the JSON summary will be
    /// written to the given location. Setting this option overrides the path
    /// that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) The voucher export to read. Setting this option
    /// overrides what may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default guessed from the file extension) The type of the input:
    /// csv or xlsx.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default the first worksheet) When using an Excel file, indicates the
    /// name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (full or slim) The export generation. Detected from the columns when
    /// not given.
    #[clap(long, value_parser)]
    pub schema: Option<String>,

    /// Keep only clients holding at least this many vouchers.
    #[clap(long, value_parser)]
    pub min_vouchers: Option<u32>,

    /// Keep only clients holding at most this many vouchers.
    #[clap(long, value_parser)]
    pub max_vouchers: Option<u32>,

    /// (YYYY-MM-DD) Keep only vouchers issued on or after this date.
    #[clap(long, value_parser)]
    pub start_date: Option<String>,

    /// (YYYY-MM-DD) Keep only vouchers issued on or before this date.
    #[clap(long, value_parser)]
    pub end_date: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the
    /// standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
