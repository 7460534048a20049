//! Selection of the historical days a forecast is trained on.

use chrono::{Datelike, Duration, NaiveDate};

/// The same-weekday days preceding a target date that are admissible as
/// training data, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWindow {
    target: NaiveDate,
    days: Vec<NaiveDate>,
}

impl HistoryWindow {
    /// Build the window of `lookback_weeks` prior occurrences of the target's
    /// weekday, dropping any day before `epoch_year`.
    pub fn new(target: NaiveDate, lookback_weeks: u32, epoch_year: i32) -> Self {
        Self {
            target,
            days: history_days(target, lookback_weeks, epoch_year),
        }
    }

    pub fn target(&self) -> NaiveDate {
        self.target
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.days.contains(&day)
    }

    /// Regressor input for a history day: calendar weeks back from the target.
    pub fn week_offset(&self, day: NaiveDate) -> i64 {
        week_offset(self.target, day)
    }
}

/// Days exactly 7, 14, ..., 7N days before `target`, filtered to `year >= epoch_year`.
pub fn history_days(target: NaiveDate, lookback_weeks: u32, epoch_year: i32) -> Vec<NaiveDate> {
    (1..=i64::from(lookback_weeks))
        .filter_map(|weeks| target.checked_sub_signed(Duration::weeks(weeks)))
        .filter(|day| day.year() >= epoch_year)
        .collect()
}

/// Signed number of calendar weeks between the week containing `target`
/// and the week containing `day`. Positive when `day` lies in an earlier week.
pub fn week_offset(target: NaiveDate, day: NaiveDate) -> i64 {
    (week_start(target) - week_start(day)).num_days() / 7
}

/// Monday of the ISO week containing `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}
