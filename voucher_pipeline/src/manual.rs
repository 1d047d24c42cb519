/*!

# Working with voucher exports

This section walks through the usual session end to end: getting an export
out of the voucher system, cleaning it, and querying the client journey
view.

**Getting the data** Export the voucher report from the administration
system as a plain spreadsheet (`.xlsx`) or CSV file. Both generations of the
export are understood: the wide report that still repeats the household
columns from before the April 2023 form change, and the trimmed report
produced since. The generation is detected from the column names, so no flag
is needed; pass one explicitly through [`CleanRules`](crate::CleanRules)
only when feeding a hand-built extract.

Password-protected workbooks are not read. Remove the protection when
saving the export.

**Cleaning** Run the command line tool against the export:

```bash
vjourney --input vouchers.xlsx
```

or, from a host application, load the rows into a [`Table`](crate::Table)
(see [`TableBuilder`](crate::builder::TableBuilder)) and call
[`clean_table`](crate::clean_table):

```text
let cleaned = clean_table(&raw, &CleanRules::default())?;
```

Cleaning is deterministic and never edits in place: hold on to the returned
table and share it read-only between queries. The only hard failure is a
missing required column, reported by name; malformed dates, band counts and
county spellings are resolved silently by the coercion rules.

**Querying journeys** Every query is a pure function over the cleaned
table. The journey view groups vouchers per client and pivots them into
numbered detail columns:

```bash
vjourney --input vouchers.xlsx --min-vouchers 2 --start-date 2023-01-01
```

The number of detail columns equals the longest voucher sequence that
survived the filters, so it changes from query to query. An empty result is
reported as "no matching result", not as an error.

**Checking a report** When migrating between machines or versions, keep a
known-good JSON summary and pass it back with `--reference`; the tool diffs
the freshly computed summary against it and fails on any difference:

```bash
vjourney --config report.json --reference last_month_summary.json
```

**Logging** Both the library and the tool log through the standard logging
facade. Set `RUST_LOG=debug` (or pass `--verbose` to the tool) to see
per-stage row counts while a report runs.

*/
