use log::{debug, info};

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::config::*;
use crate::{
    CLIENT_ID_COL, CREATED_COL, CRISIS_COL, DATE_FORMAT, FIRST_NAME_COL, ISSUED_BY_COL,
    ISSUE_DATE_COL, LAST_NAME_COL, REASON_COL, REFERRAL_COL, UNKNOWN,
};

// One client's collected voucher sequence, in filtered input row order.
#[derive(Debug, Clone)]
struct ClientGroup {
    key: (Cell, Cell, Cell),
    dates: Vec<NaiveDate>,
    agents: Vec<String>,
}

/// Aggregates a cleaned dataset into one row per client: the voucher count,
/// the latest issue date and one slot column per voucher up to the longest
/// surviving sequence.
///
/// Returns `Ok(None)` when no client matches the query; callers must check
/// before using the result. The slot column count is recomputed per query,
/// so two queries over the same dataset may produce different widths.
pub fn journey_table(dataset: &Table, query: &JourneyQuery) -> Result<Option<Table>, CleanError> {
    let id_index = dataset.require_column(CLIENT_ID_COL)?;
    let first_index = dataset.require_column(FIRST_NAME_COL)?;
    let last_index = dataset.require_column(LAST_NAME_COL)?;
    let date_index = dataset.require_column(ISSUE_DATE_COL)?;
    let agent_index = dataset.require_column(ISSUED_BY_COL)?;

    info!(
        "journey_table: {} rows, query {:?}",
        dataset.num_rows(),
        query
    );

    // Group in first-appearance order. Within a group the sequence keeps the
    // filtered input row order; same-day vouchers are not reordered.
    let mut order: Vec<(Cell, Cell, Cell)> = Vec::new();
    let mut groups: HashMap<(Cell, Cell, Cell), (Vec<NaiveDate>, Vec<String>)> = HashMap::new();

    for row in dataset.rows() {
        // A row without a parseable issue date cannot be placed in a dated
        // sequence or window.
        let date = match row[date_index].as_date() {
            Some(d) => d,
            None => continue,
        };
        if let Some(start) = query.start_date {
            if date < start {
                continue;
            }
        }
        if let Some(end) = query.end_date {
            if date > end {
                continue;
            }
        }

        let key = (
            row[id_index].clone(),
            row[first_index].clone(),
            row[last_index].clone(),
        );
        let agent = if row[agent_index].is_empty() {
            UNKNOWN.to_string()
        } else {
            row[agent_index].to_string()
        };
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (Vec::new(), Vec::new())
        });
        entry.0.push(date);
        entry.1.push(agent);
    }

    let surviving: Vec<ClientGroup> = order
        .into_iter()
        .filter_map(|key| {
            let (dates, agents) = groups.remove(&key)?;
            let count = dates.len() as u32;
            if let Some(min) = query.min_voucher_count {
                if count < min {
                    return None;
                }
            }
            if let Some(max) = query.max_voucher_count {
                if count > max {
                    return None;
                }
            }
            Some(ClientGroup { key, dates, agents })
        })
        .collect();

    if surviving.is_empty() {
        debug!("journey_table: no client matched");
        return Ok(None);
    }

    let width = surviving.iter().map(|g| g.dates.len()).max().unwrap_or(0);
    debug!(
        "journey_table: {} clients, {} slot columns",
        surviving.len(),
        width
    );

    let mut columns: Vec<String> = [
        "Client ID",
        "First Name",
        "Last Name",
        "Voucher Count",
        "Latest Issue Date",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for slot in 0..width {
        columns.push(format!("Voucher Detail {} (Issue Date - Issued by)", slot + 1));
    }

    let mut out = Table::new(columns);
    for group in surviving {
        // The date list is never empty here.
        let latest = group.dates.iter().max().unwrap();
        let mut cells = vec![
            group.key.0.clone(),
            group.key.1.clone(),
            group.key.2.clone(),
            Cell::Int(group.dates.len() as i64),
            Cell::Text(latest.format(DATE_FORMAT).to_string()),
        ];
        for slot in 0..width {
            cells.push(if slot < group.dates.len() {
                Cell::Text(format!(
                    "{} - {}",
                    group.dates[slot].format(DATE_FORMAT),
                    group.agents[slot]
                ))
            } else {
                Cell::Empty
            });
        }
        out.push_row(cells)?;
    }
    Ok(Some(out))
}

/// One client's records sorted by issue date, with a derived `reason`
/// column: the crisis type for records created before the cutover date, the
/// referral reasons after it.
///
/// Returns `Ok(None)` when the query selects nothing, or when no selection
/// criteria were given at all.
pub fn client_history(
    dataset: &Table,
    query: &ClientQuery,
    rules: &CleanRules,
) -> Result<Option<Table>, CleanError> {
    if query.client_id.is_none() && query.first_name.is_none() && query.last_name.is_none() {
        return Ok(None);
    }

    let id_index = dataset.require_column(CLIENT_ID_COL)?;
    let first_index = dataset.require_column(FIRST_NAME_COL)?;
    let last_index = dataset.require_column(LAST_NAME_COL)?;
    let date_index = dataset.require_column(ISSUE_DATE_COL)?;
    let created_index = dataset.require_column(CREATED_COL)?;
    let crisis_index = dataset.require_column(CRISIS_COL)?;
    let referral_index = dataset.column_index(REFERRAL_COL);

    let name_matches = |cell: &Cell, wanted: &Option<String>| match wanted {
        Some(name) => cell.to_string().eq_ignore_ascii_case(name),
        None => true,
    };

    let mut selected: Vec<&Vec<Cell>> = dataset
        .rows()
        .iter()
        .filter(|row| {
            let id_ok = match &query.client_id {
                Some(id) => row[id_index].to_string() == *id,
                None => true,
            };
            id_ok
                && name_matches(&row[first_index], &query.first_name)
                && name_matches(&row[last_index], &query.last_name)
        })
        .collect();

    if selected.is_empty() {
        debug!("client_history: no record matched {:?}", query);
        return Ok(None);
    }

    // Stable sort: same-day records keep their input order either way.
    selected.sort_by(|a, b| {
        let da = a[date_index].as_date();
        let db = b[date_index].as_date();
        let ordering = match (da, db) {
            (Some(x), Some(y)) => x.cmp(&y),
            // Undated records sink to the end.
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        if query.newest_first {
            ordering.reverse()
        } else {
            ordering
        }
    });

    let mut columns = dataset.columns().to_vec();
    columns.push(REASON_COL.to_string());

    let mut out = Table::new(columns);
    for row in selected {
        let before_cutover = match row[created_index].as_date() {
            Some(created) => created < rules.cutover_date,
            None => false,
        };
        let source = if before_cutover {
            &row[crisis_index]
        } else {
            match referral_index {
                Some(idx) => &row[idx],
                None => &Cell::Empty,
            }
        };
        let reason = if source.is_empty() {
            Cell::Text(UNKNOWN.to_string())
        } else {
            Cell::Text(source.to_string())
        };
        let mut cells = row.clone();
        cells.push(reason);
        out.push_row(cells)?;
    }
    Ok(Some(out))
}

/// Groups a chronologically sorted history into contiguous runs of the same
/// reason value. Consecutive identical reasons merge; a repeat separated by
/// a different reason starts a new segment. The segments partition the
/// input order with no gaps or overlaps.
pub fn reason_timeline(history: &Table) -> Result<Vec<TimelineSegment>, CleanError> {
    let reason_index = history.require_column(REASON_COL)?;
    let date_index = history.require_column(ISSUE_DATE_COL)?;

    let mut segments: Vec<TimelineSegment> = Vec::new();
    for row in history.rows() {
        let reason = if row[reason_index].is_empty() {
            UNKNOWN.to_string()
        } else {
            row[reason_index].to_string()
        };
        let date = row[date_index].as_date();
        match segments.last_mut() {
            Some(segment) if segment.reason == reason => {
                if let Some(d) = date {
                    segment.dates.push(d);
                }
            }
            _ => segments.push(TimelineSegment {
                reason,
                dates: date.into_iter().collect(),
            }),
        }
    }
    // Dates within a run are presented oldest first whatever the sort
    // direction of the history was.
    for segment in &mut segments {
        segment.dates.sort();
    }
    debug!("reason_timeline: {} segments", segments.len());
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableBuilder;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // A minimal cleaned dataset: one row per voucher.
    fn dataset(rows: &[(i64, &str, &str, NaiveDate, &str)]) -> Table {
        let mut builder = TableBuilder::new(&[
            CLIENT_ID_COL,
            FIRST_NAME_COL,
            LAST_NAME_COL,
            CREATED_COL,
            ISSUE_DATE_COL,
            ISSUED_BY_COL,
            CRISIS_COL,
            REFERRAL_COL,
        ]);
        for (id, first, last, issued, agent) in rows {
            builder
                .push_row(vec![
                    Cell::Int(*id),
                    Cell::Text(first.to_string()),
                    Cell::Text(last.to_string()),
                    Cell::Date(*issued),
                    Cell::Date(*issued),
                    Cell::Text(agent.to_string()),
                    Cell::Text("Low income".to_string()),
                    Cell::Text("Debt".to_string()),
                ])
                .unwrap();
        }
        builder.build()
    }

    fn text(table: &Table, row: usize, column: &str) -> String {
        let idx = table.column_index(column).unwrap();
        table.rows()[row][idx].to_string()
    }

    #[test]
    fn pivots_to_the_longest_surviving_sequence() {
        let data = dataset(&[
            (1, "Anna", "Smith", date(2023, 1, 1), "Foodbank A"),
            (1, "Anna", "Smith", date(2023, 2, 1), "Foodbank B"),
            (2, "Ben", "Jones", date(2023, 3, 1), "Foodbank A"),
        ]);
        let result = journey_table(&data, &JourneyQuery::UNBOUNDED)
            .unwrap()
            .unwrap();

        // Two slot columns: the widest sequence has two vouchers.
        assert_eq!(result.num_columns(), 5 + 2);
        assert_eq!(result.num_rows(), 2);

        assert_eq!(text(&result, 0, "Voucher Count"), "2");
        assert_eq!(
            text(&result, 0, "Voucher Detail 1 (Issue Date - Issued by)"),
            "2023-01-01 - Foodbank A"
        );
        assert_eq!(
            text(&result, 0, "Voucher Detail 2 (Issue Date - Issued by)"),
            "2023-02-01 - Foodbank B"
        );
        assert_eq!(text(&result, 0, "Latest Issue Date"), "2023-02-01");

        assert_eq!(text(&result, 1, "Voucher Count"), "1");
        let second_slot = result
            .column_index("Voucher Detail 2 (Issue Date - Issued by)")
            .unwrap();
        assert_eq!(result.rows()[1][second_slot], Cell::Empty);
    }

    #[test]
    fn date_window_excludes_clients_and_shrinks_the_pivot() {
        let data = dataset(&[
            (1, "Anna", "Smith", date(2023, 1, 1), "Foodbank A"),
            (1, "Anna", "Smith", date(2023, 2, 1), "Foodbank A"),
            (2, "Ben", "Jones", date(2023, 3, 1), "Foodbank A"),
        ]);
        let query = JourneyQuery {
            start_date: Some(date(2023, 2, 15)),
            ..JourneyQuery::UNBOUNDED
        };
        let result = journey_table(&data, &query).unwrap().unwrap();

        // Anna has no voucher in the window: she is absent entirely and no
        // longer influences the slot width.
        assert_eq!(result.num_rows(), 1);
        assert_eq!(result.num_columns(), 5 + 1);
        assert_eq!(text(&result, 0, "First Name"), "Ben");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let data = dataset(&[(1, "Anna", "Smith", date(2023, 1, 1), "Foodbank A")]);
        let query = JourneyQuery {
            start_date: Some(date(2023, 1, 1)),
            end_date: Some(date(2023, 1, 1)),
            ..JourneyQuery::UNBOUNDED
        };
        assert!(journey_table(&data, &query).unwrap().is_some());
    }

    #[test]
    fn voucher_count_bounds_filter_clients() {
        let data = dataset(&[
            (1, "Anna", "Smith", date(2023, 1, 1), "Foodbank A"),
            (1, "Anna", "Smith", date(2023, 2, 1), "Foodbank A"),
            (1, "Anna", "Smith", date(2023, 3, 1), "Foodbank A"),
        ]);

        let capped = JourneyQuery {
            max_voucher_count: Some(2),
            ..JourneyQuery::UNBOUNDED
        };
        assert_eq!(journey_table(&data, &capped).unwrap(), None);

        let exact = JourneyQuery {
            max_voucher_count: Some(3),
            ..JourneyQuery::UNBOUNDED
        };
        let result = journey_table(&data, &exact).unwrap().unwrap();
        assert_eq!(text(&result, 0, "Voucher Count"), "3");

        let floor = JourneyQuery {
            min_voucher_count: Some(4),
            ..JourneyQuery::UNBOUNDED
        };
        assert_eq!(journey_table(&data, &floor).unwrap(), None);
    }

    #[test]
    fn no_matching_client_yields_none() {
        let data = dataset(&[(1, "Anna", "Smith", date(2023, 1, 1), "Foodbank A")]);
        let query = JourneyQuery {
            start_date: Some(date(2024, 1, 1)),
            ..JourneyQuery::UNBOUNDED
        };
        assert_eq!(journey_table(&data, &query).unwrap(), None);
    }

    #[test]
    fn history_selects_by_name_case_insensitively() {
        let data = dataset(&[
            (1, "Anna", "Smith", date(2023, 5, 1), "Foodbank A"),
            (2, "Ben", "Jones", date(2023, 5, 2), "Foodbank A"),
        ]);
        let query = ClientQuery {
            first_name: Some("anna".to_string()),
            last_name: Some("SMITH".to_string()),
            ..ClientQuery::default()
        };
        let history = client_history(&data, &query, &CleanRules::default())
            .unwrap()
            .unwrap();
        assert_eq!(history.num_rows(), 1);
        assert_eq!(text(&history, 0, CLIENT_ID_COL), "1");
    }

    #[test]
    fn history_reason_switches_at_the_cutover() {
        let data = dataset(&[
            // Created before the form change: crisis type wins.
            (1, "Anna", "Smith", date(2023, 3, 1), "Foodbank A"),
            // Created after: referral reasons win.
            (1, "Anna", "Smith", date(2023, 5, 1), "Foodbank A"),
        ]);
        let query = ClientQuery {
            client_id: Some("1".to_string()),
            ..ClientQuery::default()
        };
        let history = client_history(&data, &query, &CleanRules::default())
            .unwrap()
            .unwrap();
        assert_eq!(text(&history, 0, REASON_COL), "Low income");
        assert_eq!(text(&history, 1, REASON_COL), "Debt");
    }

    #[test]
    fn history_sorts_both_directions() {
        let data = dataset(&[
            (1, "Anna", "Smith", date(2023, 5, 1), "Foodbank A"),
            (1, "Anna", "Smith", date(2023, 1, 1), "Foodbank A"),
        ]);
        let mut query = ClientQuery {
            client_id: Some("1".to_string()),
            ..ClientQuery::default()
        };

        let oldest_first = client_history(&data, &query, &CleanRules::default())
            .unwrap()
            .unwrap();
        assert_eq!(text(&oldest_first, 0, ISSUE_DATE_COL), "2023-01-01");

        query.newest_first = true;
        let newest_first = client_history(&data, &query, &CleanRules::default())
            .unwrap()
            .unwrap();
        assert_eq!(text(&newest_first, 0, ISSUE_DATE_COL), "2023-05-01");
    }

    #[test]
    fn history_without_criteria_yields_none() {
        let data = dataset(&[(1, "Anna", "Smith", date(2023, 5, 1), "Foodbank A")]);
        let result = client_history(&data, &ClientQuery::default(), &CleanRules::default());
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn timeline_merges_consecutive_reasons_only() {
        let mut builder = TableBuilder::new(&[ISSUE_DATE_COL, REASON_COL]);
        let reasons = [
            (date(2023, 1, 1), "A"),
            (date(2023, 2, 1), "A"),
            (date(2023, 3, 1), "B"),
            (date(2023, 4, 1), "A"),
        ];
        for (d, reason) in reasons {
            builder
                .push_row(vec![Cell::Date(d), Cell::Text(reason.to_string())])
                .unwrap();
        }

        let segments = reason_timeline(&builder.build()).unwrap();
        assert_eq!(
            segments,
            vec![
                TimelineSegment {
                    reason: "A".to_string(),
                    dates: vec![date(2023, 1, 1), date(2023, 2, 1)],
                },
                TimelineSegment {
                    reason: "B".to_string(),
                    dates: vec![date(2023, 3, 1)],
                },
                TimelineSegment {
                    reason: "A".to_string(),
                    dates: vec![date(2023, 4, 1)],
                },
            ]
        );
    }

    #[test]
    fn timeline_orders_dates_within_a_run() {
        let mut builder = TableBuilder::new(&[ISSUE_DATE_COL, REASON_COL]);
        // A newest-first history still reports each run oldest first.
        for d in [date(2023, 3, 1), date(2023, 2, 1), date(2023, 1, 1)] {
            builder
                .push_row(vec![Cell::Date(d), Cell::Text("A".to_string())])
                .unwrap();
        }
        let segments = reason_timeline(&builder.build()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(
            segments[0].dates,
            vec![date(2023, 1, 1), date(2023, 2, 1), date(2023, 3, 1)]
        );
    }
}
