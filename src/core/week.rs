use crate::domain::model::WeekKey;
use chrono::{Datelike, Days, Local, NaiveDate};

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn week_key_for_offset(today: NaiveDate, offset: u32) -> WeekKey {
    let target = today
        .checked_add_days(Days::new(7 * u64::from(offset)))
        .unwrap_or(today);
    WeekKey::from_date(target)
}

/// Monday through Sunday of the week.
pub fn week_date_range(key: WeekKey) -> Option<(NaiveDate, NaiveDate)> {
    let monday = key.monday()?;
    let sunday = monday.checked_add_days(Days::new(6))?;
    Some((monday, sunday))
}

/// `Week 35 (Aug 25 - Aug 31)`; both dates carry the year when the week spans two.
pub fn format_week_label(key: WeekKey) -> String {
    match week_date_range(key) {
        Some((start, end)) if start.year() != end.year() => format!(
            "Week {} ({} - {})",
            key.week,
            start.format("%b %d, %Y"),
            end.format("%b %d, %Y")
        ),
        Some((start, end)) => format!(
            "Week {} ({} - {})",
            key.week,
            start.format("%b %d"),
            end.format("%b %d")
        ),
        None => format!("Week {}", key.week),
    }
}

pub fn relative_prefix(offset: u32) -> String {
    match offset {
        0 => "This Week".to_string(),
        1 => "Next Week".to_string(),
        2 => "Week After Next".to_string(),
        n => format!("Week +{}", n),
    }
}

pub fn relative_week_label(today: NaiveDate, offset: u32) -> String {
    format!(
        "{} - {}",
        relative_prefix(offset),
        format_week_label(week_key_for_offset(today, offset))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_key_for_offset() {
        let today = date(2025, 8, 27);
        assert_eq!(week_key_for_offset(today, 0).to_string(), "2025-W35");
        assert_eq!(week_key_for_offset(today, 3).to_string(), "2025-W38");

        let late_december = date(2025, 12, 24);
        assert_eq!(week_key_for_offset(late_december, 1).to_string(), "2026-W01");
    }

    #[test]
    fn test_format_week_label() {
        let key: WeekKey = "2025-W35".parse().unwrap();
        assert_eq!(format_week_label(key), "Week 35 (Aug 25 - Aug 31)");

        let spanning: WeekKey = "2026-W01".parse().unwrap();
        assert_eq!(
            format_week_label(spanning),
            "Week 1 (Dec 29, 2025 - Jan 04, 2026)"
        );
    }

    #[test]
    fn test_relative_week_label() {
        let today = date(2025, 8, 27);
        assert_eq!(
            relative_week_label(today, 0),
            "This Week - Week 35 (Aug 25 - Aug 31)"
        );
        assert!(relative_week_label(today, 1).starts_with("Next Week - Week 36"));
        assert!(relative_week_label(today, 2).starts_with("Week After Next - Week 37"));
        assert!(relative_week_label(today, 3).starts_with("Week +3 - Week 38"));
    }
}
