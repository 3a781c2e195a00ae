use crate::error::PipelineError;
use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashSet;
use std::ops::RangeInclusive;

/// Ontario public holidays over an explicit range of years.
///
/// Built once per run and handed to the time-feature step, so the per-row
/// check is a set lookup. Dates outside the configured years are never
/// holidays; widen the range when the data horizon grows.
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    years: RangeInclusive<i32>,
    dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn ontario(years: RangeInclusive<i32>) -> Result<Self> {
        if years.is_empty() {
            return Err(PipelineError::InvalidConfig {
                message: format!("holiday range {}..={} is inverted", years.start(), years.end()),
            }
            .into());
        }

        let mut dates = HashSet::new();
        for year in years.clone() {
            dates.extend(ontario_holidays(year));
        }

        Ok(Self { years, dates })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn years(&self) -> &RangeInclusive<i32> {
        &self.years
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

fn ontario_holidays(year: i32) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = Vec::with_capacity(14);

    let fixed = [(1, 1), (7, 1), (12, 25), (12, 26)];
    let fixed: Vec<NaiveDate> = fixed
        .iter()
        .filter_map(|&(m, d)| NaiveDate::from_ymd_opt(year, m, d))
        .collect();
    days.extend(fixed.iter().copied());

    if year >= 2008 {
        // Family Day
        days.extend(NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3));
    }
    if let Some(easter) = easter_sunday(year) {
        days.push(easter - Duration::days(2));
    }
    days.extend(victoria_day(year));
    // Civic Holiday, Labour Day, Thanksgiving
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 8, Weekday::Mon, 1));
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1));
    days.extend(NaiveDate::from_weekday_of_month_opt(year, 10, Weekday::Mon, 2));

    // Weekend fixed-date holidays roll to the next free weekday, in calendar
    // order so Christmas claims the Monday before Boxing Day does.
    for date in fixed {
        if is_weekend(date) {
            let mut observed = date + Duration::days(1);
            while is_weekend(observed) || days.contains(&observed) {
                observed += Duration::days(1);
            }
            days.push(observed);
        }
    }

    days
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Last Monday strictly before May 25.
fn victoria_day(year: i32) -> Option<NaiveDate> {
    let may_24 = NaiveDate::from_ymd_opt(year, 5, 24)?;
    Some(may_24 - Duration::days(may_24.weekday().num_days_from_monday() as i64))
}

/// Anonymous Gregorian computus.
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
