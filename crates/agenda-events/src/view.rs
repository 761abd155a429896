//! Presentation helpers shared by front ends: search filtering and
//! month-grid day styling.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::types::Event;

/// Events whose title or description contains `term`, ignoring case.
///
/// An empty term matches everything.
pub fn filter_events<'a>(events: &'a [Event], term: &str) -> Vec<&'a Event> {
    let needle = term.trim().to_lowercase();
    events
        .iter()
        .filter(|event| {
            needle.is_empty()
                || event.title.to_lowercase().contains(&needle)
                || event
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Events overlapping `date` as a calendar day in `tz`.
///
/// Front ends pass the zone they display times in (usually `Local`), so an
/// evening event lands in the cell of the day it is shown on.
pub fn events_on<'a, Tz: TimeZone>(events: &'a [Event], date: NaiveDate, tz: &Tz) -> Vec<&'a Event> {
    let bounds = day_start(date, tz).zip(date.succ_opt().and_then(|next| day_start(next, tz)));
    let Some((start, end)) = bounds else {
        return Vec::new();
    };
    events
        .iter()
        .filter(|e| e.start < end && e.end > start)
        .collect()
}

/// First instant of `date` in `tz`. Midnight can fall in a DST gap, in
/// which case the day starts at the first hour that exists.
fn day_start<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    (0..=3)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|start| start.with_timezone(&Utc))
}

/// Visual treatment of a day cell in a month grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStyle {
    Selected,
    Today,
    OutsideMonth,
    Normal,
}

impl DayStyle {
    /// Style for `date`. Selection wins over today, today over out-of-month.
    ///
    /// "Out of month" is relative to the month containing `today`.
    pub fn for_date(date: NaiveDate, selected: Option<NaiveDate>, today: NaiveDate) -> Self {
        if selected == Some(date) {
            DayStyle::Selected
        } else if date == today {
            DayStyle::Today
        } else if !same_month(date, today) {
            DayStyle::OutsideMonth
        } else {
            DayStyle::Normal
        }
    }

    pub fn background(self) -> Option<&'static str> {
        match self {
            DayStyle::Selected => Some("#cfe2ff"),
            DayStyle::Today => Some("#ffeb3b"),
            DayStyle::OutsideMonth => Some("#f0f0f0"),
            DayStyle::Normal => None,
        }
    }

    pub fn border(self) -> Option<&'static str> {
        match self {
            DayStyle::Selected => Some("1px solid #007bff"),
            DayStyle::Today => Some("1px solid #f57c00"),
            DayStyle::OutsideMonth | DayStyle::Normal => None,
        }
    }

    /// Single-character marker for plain-text grids.
    pub fn marker(self) -> char {
        match self {
            DayStyle::Selected => '>',
            DayStyle::Today => '*',
            DayStyle::OutsideMonth => '.',
            DayStyle::Normal => ' ',
        }
    }
}

/// New events may only be created on a day in the current month.
pub fn can_create_on(date: NaiveDate, today: NaiveDate) -> bool {
    same_month(date, today)
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Weeks (Sunday first) covering the given month, padded with days from the
/// neighbouring months. Returns an empty grid for an invalid month.
pub fn month_grid(year: i32, month: u32) -> Vec<[NaiveDate; 7]> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let offset = i64::from(first.weekday().num_days_from_sunday());
    let mut cursor = first - Duration::days(offset);

    let mut weeks = Vec::new();
    loop {
        let week: [NaiveDate; 7] = std::array::from_fn(|i| cursor + Duration::days(i as i64));
        cursor += Duration::days(7);
        weeks.push(week);
        if !same_month(cursor, first) {
            break;
        }
    }
    weeks
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use chrono::FixedOffset;

    fn event(id: &str, title: &str, description: Option<&str>, start: &str, end: &str) -> Event {
        Event {
            id: id.into(),
            title: title.into(),
            description: description.map(str::to_string),
            start: DateTime::parse_from_rfc3339(start).unwrap().with_timezone(&Utc),
            end: DateTime::parse_from_rfc3339(end).unwrap().with_timezone(&Utc),
            attachments: vec![],
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<Event> {
        vec![
            event("1", "Team Standup", None, "2024-02-01T09:00:00Z", "2024-02-01T09:15:00Z"),
            event("2", "Lunch", Some("With the design TEAM"), "2024-02-01T12:00:00Z", "2024-02-01T13:00:00Z"),
            event("3", "Dentist", Some(""), "2024-02-02T08:00:00Z", "2024-02-02T09:00:00Z"),
        ]
    }

    #[test]
    fn test_filter_matches_title_or_description_case_insensitive() {
        let events = sample();
        let ids: Vec<_> = filter_events(&events, "team").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_filter_empty_term_matches_all() {
        let events = sample();
        assert_eq!(filter_events(&events, "").len(), 3);
        assert_eq!(filter_events(&events, "   ").len(), 3);
    }

    #[test]
    fn test_filter_handles_missing_description() {
        let events = sample();
        assert!(filter_events(&events, "orthodontist").is_empty());
    }

    #[test]
    fn test_events_on_day() {
        let events = sample();
        assert_eq!(events_on(&events, date(2024, 2, 1), &Utc).len(), 2);
        assert_eq!(events_on(&events, date(2024, 2, 2), &Utc).len(), 1);
        assert!(events_on(&events, date(2024, 2, 3), &Utc).is_empty());
    }

    #[test]
    fn test_events_on_uses_display_zone() {
        // 21:00 on Feb 1 in New York is 02:00 on Feb 2 in UTC
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
        let events = vec![event(
            "late",
            "Late call",
            None,
            "2024-02-01T21:00:00-05:00",
            "2024-02-01T22:00:00-05:00",
        )];

        assert_eq!(events_on(&events, date(2024, 2, 1), &new_york).len(), 1);
        assert!(events_on(&events, date(2024, 2, 2), &new_york).is_empty());

        assert!(events_on(&events, date(2024, 2, 1), &Utc).is_empty());
        assert_eq!(events_on(&events, date(2024, 2, 2), &Utc).len(), 1);
    }

    #[test]
    fn test_events_on_east_of_utc() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let events = sample();
        // 09:00Z and 12:00Z on Feb 1 are 18:00 and 21:00 in Tokyo, 08:00Z Feb 2 is 17:00
        assert_eq!(events_on(&events, date(2024, 2, 1), &tokyo).len(), 2);
        assert_eq!(events_on(&events, date(2024, 2, 2), &tokyo).len(), 1);
    }

    #[test]
    fn test_day_style_precedence() {
        let today = date(2024, 2, 14);
        assert_eq!(DayStyle::for_date(today, Some(today), today), DayStyle::Selected);
        assert_eq!(DayStyle::for_date(today, None, today), DayStyle::Today);
        assert_eq!(
            DayStyle::for_date(date(2024, 1, 31), None, today),
            DayStyle::OutsideMonth
        );
        assert_eq!(
            DayStyle::for_date(date(2024, 1, 31), Some(date(2024, 1, 31)), today),
            DayStyle::Selected
        );
        assert_eq!(DayStyle::for_date(date(2024, 2, 3), None, today), DayStyle::Normal);
        // same month number, different year
        assert_eq!(
            DayStyle::for_date(date(2023, 2, 3), None, today),
            DayStyle::OutsideMonth
        );
    }

    #[test]
    fn test_day_style_colors() {
        assert_eq!(DayStyle::Selected.background(), Some("#cfe2ff"));
        assert_eq!(DayStyle::Today.border(), Some("1px solid #f57c00"));
        assert_eq!(DayStyle::OutsideMonth.background(), Some("#f0f0f0"));
        assert!(DayStyle::Normal.background().is_none());
    }

    #[test]
    fn test_can_create_only_in_current_month() {
        let today = date(2024, 2, 14);
        assert!(can_create_on(date(2024, 2, 1), today));
        assert!(!can_create_on(date(2024, 3, 1), today));
    }

    #[test]
    fn test_month_grid_february_2024() {
        // Feb 1 2024 is a Thursday
        let grid = month_grid(2024, 2);
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[0][0], date(2024, 1, 28));
        assert_eq!(grid[0][4], date(2024, 2, 1));
        assert_eq!(grid[4][4], date(2024, 2, 29));
        assert_eq!(grid[4][6], date(2024, 3, 2));
    }

    #[test]
    fn test_month_grid_starting_on_sunday() {
        // Sep 1 2024 is a Sunday
        let grid = month_grid(2024, 9);
        assert_eq!(grid[0][0], date(2024, 9, 1));
        assert_eq!(grid.len(), 5);
    }

    #[test]
    fn test_month_grid_invalid_month() {
        assert!(month_grid(2024, 13).is_empty());
    }
}
