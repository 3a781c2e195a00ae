use crate::holidays::HolidayCalendar;
use crate::models::DATETIME;
use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use polars::prelude::*;

/// Adds `hour`, `day_of_week` (Monday = 0), `month`, `day_of_year`,
/// `is_holiday` and `is_weekend` derived from the `datetime` column.
pub fn add_time_features(mut df: DataFrame, calendar: &HolidayCalendar) -> Result<DataFrame> {
    let datetimes = datetime_values(&df, DATETIME)?;

    let mut hours = Vec::with_capacity(datetimes.len());
    let mut days_of_week = Vec::with_capacity(datetimes.len());
    let mut months = Vec::with_capacity(datetimes.len());
    let mut days_of_year = Vec::with_capacity(datetimes.len());
    let mut holidays = Vec::with_capacity(datetimes.len());
    let mut weekends = Vec::with_capacity(datetimes.len());

    for dt in &datetimes {
        let dow = dt.map(|dt| dt.weekday().num_days_from_monday() as i32);
        hours.push(dt.map(|dt| dt.hour() as i32));
        days_of_week.push(dow);
        months.push(dt.map(|dt| dt.month() as i32));
        days_of_year.push(dt.map(|dt| dt.ordinal() as i32));
        holidays.push(dt.map(|dt| calendar.contains(dt.date())));
        weekends.push(dow.map(|d| d >= 5));
    }

    df.with_column(Series::new("hour", hours))?;
    df.with_column(Series::new("day_of_week", days_of_week))?;
    df.with_column(Series::new("month", months))?;
    df.with_column(Series::new("day_of_year", days_of_year))?;
    df.with_column(Series::new("is_holiday", holidays))?;
    df.with_column(Series::new("is_weekend", weekends))?;

    Ok(df)
}

/// Reads a datetime column as naive timestamps, whatever its time unit.
pub(crate) fn datetime_values(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    let millis = datetime_millis(df, name)?;
    Ok(millis
        .into_iter()
        .map(|ms| ms.and_then(naive_from_millis))
        .collect())
}

/// Epoch milliseconds of a datetime column.
pub(crate) fn datetime_millis(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let physical = df
        .column(name)?
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;
    Ok(physical.i64()?.into_iter().collect())
}

/// Builds a millisecond `Datetime` series from naive timestamps.
pub(crate) fn datetime_series(name: &str, values: &[Option<NaiveDateTime>]) -> Result<Series> {
    let millis: Vec<Option<i64>> = values
        .iter()
        .map(|dt| dt.map(|dt| dt.and_utc().timestamp_millis()))
        .collect();
    Ok(Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

pub(crate) fn naive_from_millis(ms: i64) -> Option<NaiveDateTime> {
    let nanos = (ms.rem_euclid(1000) * 1_000_000) as u32;
    DateTime::from_timestamp(ms.div_euclid(1000), nanos).map(|dt| dt.naive_utc())
}
