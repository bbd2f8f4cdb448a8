use crate::counter::progress;
use crate::models::{DailyRecord, HistoryCell, HistoryEntry, HistoryList, HistorySeries, HistoryView};
use chrono::{Datelike, Duration, Months, NaiveDate};
use std::collections::BTreeMap;

pub type DayRecords = BTreeMap<String, DailyRecord>;

const WEEK_RADIUS: i64 = 3;

pub fn build_series(
    view: HistoryView,
    anchor: NaiveDate,
    records: Option<&DayRecords>,
    goal: u32,
) -> HistorySeries {
    match view {
        HistoryView::Month => month_series(anchor, records, goal),
        HistoryView::Week => week_series(anchor, records, goal),
    }
}

/// One cell per day of the anchor's month, zero where nothing was logged.
pub fn month_series(anchor: NaiveDate, records: Option<&DayRecords>, goal: u32) -> HistorySeries {
    let start = anchor.with_day(1).unwrap_or(anchor);
    let len = days_in_month(anchor);
    let end = start + Duration::days(i64::from(len) - 1);

    HistorySeries {
        view: "month",
        title: anchor.format("%B %Y").to_string(),
        start_date: date_key(start),
        end_date: date_key(end),
        previous: date_key(anchor.checked_sub_months(Months::new(1)).unwrap_or(anchor)),
        next: date_key(anchor.checked_add_months(Months::new(1)).unwrap_or(anchor)),
        goal,
        days: fill(start, len, records, goal),
    }
}

/// Seven days centred on the anchor; the window may span two months.
pub fn week_series(anchor: NaiveDate, records: Option<&DayRecords>, goal: u32) -> HistorySeries {
    let start = anchor - Duration::days(WEEK_RADIUS);
    let end = anchor + Duration::days(WEEK_RADIUS);

    HistorySeries {
        view: "week",
        title: anchor.format("Week of %-d %b").to_string(),
        start_date: date_key(start),
        end_date: date_key(end),
        previous: date_key(anchor - Duration::weeks(1)),
        next: date_key(anchor + Duration::weeks(1)),
        goal,
        days: fill(start, (WEEK_RADIUS * 2 + 1) as u32, records, goal),
    }
}

fn fill(start: NaiveDate, len: u32, records: Option<&DayRecords>, goal: u32) -> Vec<HistoryCell> {
    let mut days: Vec<HistoryCell> = (0..len)
        .map(|offset| {
            let date = start + Duration::days(i64::from(offset));
            HistoryCell {
                day: date.day(),
                date: date_key(date),
                count: 0,
                goal_met: false,
            }
        })
        .collect();

    if let Some(records) = records {
        for cell in days.iter_mut() {
            if let Some(record) = records.get(&cell.date) {
                cell.count = record.count;
                cell.goal_met = record.count >= goal;
            }
        }
    }

    days
}

/// Every stored day, newest first.
pub fn record_list(today: NaiveDate, records: Option<&DayRecords>, goal: u32) -> HistoryList {
    let mut entries: Vec<HistoryEntry> = records
        .into_iter()
        .flatten()
        .map(|(date, record)| HistoryEntry {
            label: parse_date(date)
                .map(|day| relative_label(day, today))
                .unwrap_or_else(|| date.clone()),
            date: date.clone(),
            count: record.count,
            goal,
            percent: progress(record.count, goal).percent,
        })
        .collect();
    entries.reverse();

    let message = entries.is_empty().then(|| "No records yet.".to_string());
    HistoryList {
        records: entries,
        message,
    }
}

pub fn relative_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        -1 => "Yesterday".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%d/%m/%Y").to_string(),
    }
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    let first = date.with_day(1).unwrap_or(date);
    first
        .checked_add_months(Months::new(1))
        .map(|next| (next - first).num_days() as u32)
        .unwrap_or(31)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(count: u32) -> DailyRecord {
        DailyRecord {
            count,
            created_at: Utc::now(),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_month_is_all_zero() {
        for (anchor, expected) in [
            (ymd(2026, 2, 14), 28),
            (ymd(2028, 2, 1), 29),
            (ymd(2026, 4, 30), 30),
            (ymd(2026, 12, 31), 31),
        ] {
            let series = month_series(anchor, None, 8);
            assert_eq!(series.days.len(), expected);
            assert!(series.days.iter().all(|cell| cell.count == 0 && !cell.goal_met));
            assert_eq!(series.days.first().unwrap().day, 1);
            assert_eq!(series.days.last().unwrap().day, expected as u32);
        }
    }

    #[test]
    fn month_overlays_stored_counts() {
        let mut records = DayRecords::new();
        records.insert("2026-03-05".into(), record(9));
        records.insert("2026-03-06".into(), record(3));
        records.insert("2026-04-01".into(), record(20));

        let series = month_series(ymd(2026, 3, 20), Some(&records), 8);
        assert_eq!(series.days.len(), 31);
        assert_eq!(series.days[4].count, 9);
        assert!(series.days[4].goal_met);
        assert_eq!(series.days[5].count, 3);
        assert!(!series.days[5].goal_met);
        assert_eq!(series.days.iter().map(|cell| cell.count).sum::<u32>(), 12);
        assert_eq!(series.previous, "2026-02-20");
        assert_eq!(series.next, "2026-04-20");
    }

    #[test]
    fn goal_met_is_inclusive() {
        let mut records = DayRecords::new();
        records.insert("2026-03-05".into(), record(8));
        records.insert("2026-03-06".into(), record(7));
        let series = month_series(ymd(2026, 3, 1), Some(&records), 8);
        assert!(series.days[4].goal_met);
        assert!(!series.days[5].goal_met);
    }

    #[test]
    fn week_window_crosses_month_boundary() {
        let mut records = DayRecords::new();
        records.insert("2026-02-27".into(), record(2));
        records.insert("2026-03-02".into(), record(10));

        let series = week_series(ymd(2026, 3, 1), Some(&records), 8);
        assert_eq!(series.days.len(), 7);
        assert_eq!(series.start_date, "2026-02-26");
        assert_eq!(series.end_date, "2026-03-04");
        assert_eq!(series.days[1].count, 2);
        assert_eq!(series.days[4].count, 10);
        assert!(series.days[4].goal_met);
        assert_eq!(series.previous, "2026-02-22");
    }

    #[test]
    fn month_navigation_clamps_day() {
        let series = month_series(ymd(2026, 1, 31), None, 8);
        assert_eq!(series.next, "2026-02-28");
    }

    #[test]
    fn record_list_is_newest_first_with_labels() {
        let mut records = DayRecords::new();
        records.insert("2026-03-01".into(), record(4));
        records.insert("2026-03-09".into(), record(12));
        records.insert("2026-03-10".into(), record(2));

        let list = record_list(ymd(2026, 3, 10), Some(&records), 8);
        let labels: Vec<_> = list.records.iter().map(|entry| entry.label.as_str()).collect();
        assert_eq!(labels, ["Today", "Yesterday", "01/03/2026"]);
        assert_eq!(list.records[1].percent, 100.0);
        assert_eq!(list.records[2].percent, 50.0);
        assert!(list.message.is_none());
    }

    #[test]
    fn empty_record_list_has_message() {
        let list = record_list(ymd(2026, 3, 10), None, 8);
        assert!(list.records.is_empty());
        assert_eq!(list.message.as_deref(), Some("No records yet."));
    }
}
