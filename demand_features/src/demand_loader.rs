use crate::error::PipelineError;
use crate::models::{PipelineConfig, DATE, DATETIME, HOUR, ONTARIO_DEMAND};
use crate::time_features::{datetime_millis, datetime_series};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub const CSV_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Loads every zonal demand report matching the configured glob, derives
/// `datetime = Date + (Hour - 1)h`, sorts by it and writes the combined
/// checkpoint CSV.
pub fn load_zonal_demand(config: &PipelineConfig) -> Result<DataFrame> {
    let pattern = config.demand_glob();
    let files = discover_files(&pattern)?;
    println!("📁 Found {} zonal demand files", files.len());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} demand files")?);

    let frames: Vec<DataFrame> = files
        .par_iter()
        .map(|file| {
            let df = read_demand_file(file, config);
            pb.inc(1);
            df
        })
        .collect::<Result<Vec<_>>>()?;

    pb.finish_with_message("Demand files loaded");

    let combined = concat(
        frames.into_iter().map(|df| df.lazy()).collect::<Vec<_>>().as_slice(),
        UnionArgs::default(),
    )?
    .sort(DATETIME, Default::default())
    .collect()?;

    ensure_unique_timestamps(&combined)?;

    let mut checkpoint = combined.clone();
    write_csv(&mut checkpoint, &config.combined_path())?;
    println!("💾 Combined zonal demand data saved to {}", config.combined_path().display());

    Ok(combined)
}

/// Expands a glob and returns the matches in a stable order. Fails when
/// nothing matches.
pub(crate) fn discover_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob(pattern)
        .with_context(|| format!("invalid glob pattern {}", pattern))?
        .filter_map(Result::ok)
        .collect();

    if files.is_empty() {
        return Err(PipelineError::MissingInput {
            pattern: pattern.to_string(),
        }
        .into());
    }

    files.sort();
    Ok(files)
}

fn read_demand_file(file: &Path, config: &PipelineConfig) -> Result<DataFrame> {
    let display = file.display().to_string();
    let raw = CsvReader::from_path(file)
        .with_context(|| format!("opening {}", display))?
        .has_header(true)
        .with_skip_rows(config.skip_rows)
        .finish()
        .with_context(|| format!("reading {}", display))?;

    let cols = raw.get_column_names();
    let mut required = vec![DATE, HOUR, ONTARIO_DEMAND];
    required.extend(config.zones.names().iter().map(String::as_str));
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !cols.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::Schema {
            file: display,
            message: format!("missing columns {:?}", missing),
        }
        .into());
    }

    let dates = raw.column(DATE)?.cast(&DataType::Utf8)?;
    let hours = raw.column(HOUR)?.cast(&DataType::Int32)?;
    let datetimes = combine_date_hour(dates.utf8()?, hours.i32()?, &display)?;

    let mut columns = vec![
        dates.clone(),
        hours.clone(),
        numeric_column(raw.column(ONTARIO_DEMAND)?, &display)?,
    ];
    for zone in config.zones.names() {
        columns.push(numeric_column(raw.column(zone)?, &display)?);
    }
    columns.push(datetime_series(DATETIME, &datetimes)?);

    debug!("{}: {} rows", display, raw.height());
    Ok(DataFrame::new(columns)?)
}

/// Hours are reported 1..=24, so hour 24 lands on midnight of the next day.
fn combine_date_hour(dates: &Utf8Chunked, hours: &Int32Chunked, file: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    let parse_error = |message: String| -> anyhow::Error {
        PipelineError::Parse {
            file: file.to_string(),
            message,
        }
        .into()
    };

    let mut datetimes = Vec::with_capacity(dates.len());
    for (row, (date, hour)) in dates.into_iter().zip(hours.into_iter()).enumerate() {
        let (date, hour) = match (date, hour) {
            (Some(date), Some(hour)) => (date, hour),
            _ => return Err(parse_error(format!("row {} has an empty Date or Hour", row))),
        };
        let date = parse_date(date)
            .ok_or_else(|| parse_error(format!("row {}: unrecognised date {:?}", row, date)))?;
        if !(1..=24).contains(&hour) {
            return Err(parse_error(format!("row {}: hour {} outside 1..=24", row, hour)));
        }
        let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        datetimes.push(Some(midnight + Duration::hours(hour as i64 - 1)));
    }

    Ok(datetimes)
}

/// Casts a measurement column to Float64, failing on the first cell that
/// holds something other than a number. Empty cells stay null.
pub(crate) fn numeric_column(series: &Series, file: &str) -> Result<Series> {
    if let Ok(values) = series.strict_cast(&DataType::Float64) {
        return Ok(values);
    }

    let lenient = series.cast(&DataType::Float64)?;
    let rejected = lenient.is_null() & series.is_not_null();
    let row = rejected.into_iter().position(|flag| flag == Some(true));
    let text = series.cast(&DataType::Utf8)?;
    let value = row
        .and_then(|row| text.utf8().ok()?.get(row))
        .unwrap_or_default()
        .to_string();

    Err(PipelineError::Parse {
        file: file.to_string(),
        message: format!(
            "column {:?} row {}: non-numeric value {}",
            series.name(),
            row.unwrap_or_default(),
            value
        ),
    }
    .into())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn ensure_unique_timestamps(df: &DataFrame) -> Result<()> {
    let millis = datetime_millis(df, DATETIME)?;
    for pair in millis.windows(2) {
        if pair[0] == pair[1] {
            let key = pair[0]
                .and_then(crate::time_features::naive_from_millis)
                .map(|dt| dt.to_string())
                .unwrap_or_else(|| "null".to_string());
            return Err(PipelineError::DuplicateKey {
                table: "zonal demand".to_string(),
                key,
            }
            .into());
        }
    }
    Ok(())
}

pub(crate) fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .has_header(true)
        .with_datetime_format(Some(CSV_DATETIME_FORMAT.to_string()))
        .finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ZoneSet;
    use crate::test_support::{hour0, replace_field, write_demand_file};
    use crate::time_features::datetime_values;

    fn config_for(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            demand_dir: dir.to_path_buf(),
            output_dir: dir.join("out"),
            zones: ZoneSet::new(["Toronto", "Ottawa"]),
            ..Default::default()
        }
    }

    #[test]
    fn test_datetime_derivation_and_sort() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        // Written out of order on purpose; the second week sorts first.
        write_demand_file(dir.path(), "PUB_DemandZonal_20240108.csv", hour0(2024, 1, 8), 24, &config.zones);
        write_demand_file(dir.path(), "PUB_DemandZonal_20240101.csv", hour0(2024, 1, 1), 48, &config.zones);

        let df = load_zonal_demand(&config).unwrap();
        assert_eq!(df.height(), 72);

        let stamps = datetime_values(&df, DATETIME).unwrap();
        assert_eq!(stamps[0], Some(hour0(2024, 1, 1)));
        // Hour 24 of Jan 1 is 23:00 on Jan 1
        assert_eq!(stamps[23], Some(hour0(2024, 1, 1) + Duration::hours(23)));
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));

        let hours = df.column(HOUR).unwrap().i32().unwrap();
        let dates = df.column(DATE).unwrap().utf8().unwrap();
        for i in 0..df.height() {
            let date = parse_date(dates.get(i).unwrap()).unwrap();
            let expected = date.and_hms_opt(0, 0, 0).unwrap() + Duration::hours(hours.get(i).unwrap() as i64 - 1);
            assert_eq!(stamps[i], Some(expected));
        }

        assert!(config.combined_path().exists());
        let checkpoint = CsvReader::from_path(config.combined_path()).unwrap().finish().unwrap();
        assert_eq!(checkpoint.height(), 72);
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_zonal_demand(&config_for(dir.path())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingInput { .. })
        ));
    }

    #[test]
    fn test_missing_zone_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());
        write_demand_file(dir.path(), "PUB_DemandZonal_20240101.csv", hour0(2024, 1, 1), 24, &config.zones);
        config.zones = ZoneSet::new(["Toronto", "Ottawa", "Essa"]);

        let err = load_zonal_demand(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Schema { .. })
        ));
    }

    #[test]
    fn test_overlapping_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_demand_file(dir.path(), "PUB_DemandZonal_a.csv", hour0(2024, 1, 1), 24, &config.zones);
        write_demand_file(dir.path(), "PUB_DemandZonal_b.csv", hour0(2024, 1, 1), 24, &config.zones);

        let err = load_zonal_demand(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::DuplicateKey { .. })
        ));
    }

    // Line 3 is the header, line 4 the first data row (Date, Hour, Ontario
    // Demand, Toronto, Ottawa, ...).
    fn single_day(dir: &Path, config: &PipelineConfig) -> PathBuf {
        write_demand_file(dir, "PUB_DemandZonal_20240101.csv", hour0(2024, 1, 1), 24, &config.zones)
    }

    fn assert_error(config: &PipelineConfig, check: fn(&PipelineError) -> bool) {
        let err = load_zonal_demand(config).unwrap_err();
        let err = err.downcast_ref::<PipelineError>().expect("pipeline error");
        assert!(check(err), "unexpected error {}", err);
        assert!(!config.combined_path().exists());
    }

    #[test]
    fn test_missing_required_columns() {
        for (field, name) in [DATE, HOUR, ONTARIO_DEMAND].iter().enumerate() {
            let dir = tempfile::tempdir().unwrap();
            let config = config_for(dir.path());
            let file = single_day(dir.path(), &config);
            replace_field(&file, 3, field, &format!("{} (renamed)", name));

            assert_error(&config, |err| matches!(err, PipelineError::Schema { message, .. } if message.contains("missing")));
        }
    }

    #[test]
    fn test_hour_outside_range() {
        for hour in ["0", "25"] {
            let dir = tempfile::tempdir().unwrap();
            let config = config_for(dir.path());
            let file = single_day(dir.path(), &config);
            replace_field(&file, 4, 1, hour);

            assert_error(&config, |err| matches!(err, PipelineError::Parse { message, .. } if message.contains("outside 1..=24")));
        }
    }

    #[test]
    fn test_unreadable_date() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let file = single_day(dir.path(), &config);
        replace_field(&file, 5, 0, "2024-13-45");

        assert_error(&config, |err| matches!(err, PipelineError::Parse { message, .. } if message.contains("unrecognised date")));
    }

    #[test]
    fn test_text_in_zone_column() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let file = single_day(dir.path(), &config);
        replace_field(&file, 4, 3, "N/A");

        assert_error(&config, |err| matches!(err, PipelineError::Parse { message, .. } if message.contains("Toronto")));
    }

    #[test]
    fn test_numeric_column_keeps_empty_cells() {
        let series = Series::new("Toronto", &[Some("1.5"), None, Some("3")]);
        let values = numeric_column(&series, "memory").unwrap();
        assert_eq!(values.null_count(), 1);
        assert_eq!(values.f64().unwrap().get(2), Some(3.0));

        let series = Series::new("Toronto", &[Some("1.5"), Some("abc")]);
        let err = numeric_column(&series, "memory").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("row 1"), "{}", message);
        assert!(message.contains("abc"), "{}", message);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 29);
        assert_eq!(parse_date("2024-02-29"), expected);
        assert_eq!(parse_date("02/29/2024"), expected);
        assert_eq!(parse_date("not a date"), None);
    }
}
