//! Synthetic IESO / Open-Meteo style fixtures for the unit tests.

use crate::models::ZoneSet;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub fn hour0(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Writes `<root>/HourlyZonalDemand/<name>` covering `hours` hours from
/// `start` (which must be midnight), with the report's three-line preamble.
///
/// Values ramp by one per hour since 2024-01-01 00:00, so a lag of k hours
/// always reads exactly k less than the current value.
pub fn write_demand_file(root: &Path, name: &str, start: NaiveDateTime, hours: usize, zones: &ZoneSet) -> PathBuf {
    let dir = root.join("HourlyZonalDemand");
    fs::create_dir_all(&dir).unwrap();

    let mut text = String::new();
    text.push_str("\\Hourly Zonal Demand Report\n");
    text.push_str("\\Created at 2024-01-15 00:00:00\n");
    text.push_str("\\For 2024\n");
    text.push_str("Date,Hour,Ontario Demand");
    for zone in zones.names() {
        write!(text, ",{}", zone).unwrap();
    }
    text.push_str(",Zone Total,Diff\n");

    for h in 0..hours {
        let ts = start + Duration::hours(h as i64);
        let step = ramp_step(ts);
        let ontario = 14_000 + step;
        write!(text, "{},{},{}", ts.format("%Y-%m-%d"), ts.hour() + 1, ontario).unwrap();
        for (z, _) in zones.names().iter().enumerate() {
            write!(text, ",{}", 500 + z as i64 * 1_000 + step).unwrap();
        }
        writeln!(text, ",{},0", ontario).unwrap();
    }

    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Hours elapsed since 2024-01-01 00:00.
pub fn ramp_step(ts: NaiveDateTime) -> i64 {
    (ts - hour0(2024, 1, 1)).num_hours()
}

/// Writes `<dir>/<region>Climate.csv`: a metadata preamble, `hours` hourly
/// rows and, optionally, the trailing daily summary section.
pub fn write_climate_file(dir: &Path, region: &str, start: NaiveDateTime, hours: usize, with_summary: bool) -> PathBuf {
    fs::create_dir_all(dir).unwrap();

    let mut text = String::new();
    text.push_str("latitude,longitude,elevation,utc_offset_seconds,timezone,timezone_abbreviation\n");
    text.push_str("43.7,-79.4,175.0,0,GMT,GMT\n");
    text.push('\n');
    text.push_str("time,temperature_2m (°C),relative_humidity_2m (%),wind_speed_10m (km/h)\n");

    for h in 0..hours {
        let ts = start + Duration::hours(h as i64);
        writeln!(
            text,
            "{},{:.1},{},{:.1}",
            ts.format("%Y-%m-%dT%H:%M"),
            -5.0 + (h % 24) as f64 * 0.5,
            60 + h % 30,
            10.0 + (h % 7) as f64
        )
        .unwrap();
    }

    if with_summary {
        text.push('\n');
        text.push_str("time,temperature_2m_mean (°C)\n");
        let days = (hours + 23) / 24;
        for d in 0..days {
            let day = start + Duration::days(d as i64);
            writeln!(text, "{},{:.1}", ts_date(day), 1.5).unwrap();
        }
    }

    let path = dir.join(format!("{}Climate.csv", region));
    fs::write(&path, text).unwrap();
    path
}

/// Overwrites one comma-separated field of one line (both 0-based) in place.
pub fn replace_field(path: &Path, line: usize, field: usize, value: &str) {
    let text = fs::read_to_string(path).unwrap();
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut fields: Vec<&str> = lines[line].split(',').collect();
    fields[field] = value;
    let edited = fields.join(",");
    lines[line] = edited;
    fs::write(path, lines.join("\n") + "\n").unwrap();
}

fn ts_date(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d").to_string()
}
