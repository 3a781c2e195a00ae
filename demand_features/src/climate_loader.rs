use crate::demand_loader::{discover_files, numeric_column};
use crate::error::PipelineError;
use crate::models::{PipelineConfig, CLIMATE_TIME, DATETIME, REGION};
use crate::time_features::{datetime_millis, datetime_series, naive_from_millis};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use polars::prelude::*;
use rayon::prelude::*;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Loads every `<Region>Climate.csv`, keeps the hourly section of each file
/// and returns one table sorted by (`datetime`, `region`).
pub fn load_climate_data(config: &PipelineConfig) -> Result<DataFrame> {
    let pattern = config.climate_glob();
    let files = discover_files(&pattern)?;
    println!("📁 Found {} climate files", files.len());

    let region_re = Regex::new(r"^([A-Za-z]+)Climate\.csv$")?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} climate files")?);

    let frames: Vec<DataFrame> = files
        .par_iter()
        .map(|file| {
            let df = extract_region(file, &region_re)
                .and_then(|region| read_climate_file(file, &region, config));
            pb.inc(1);
            df
        })
        .collect::<Result<Vec<_>>>()?;

    pb.finish_with_message("Climate files loaded");

    let combined = concat(
        frames.into_iter().map(|df| df.lazy()).collect::<Vec<_>>().as_slice(),
        UnionArgs {
            to_supertypes: true,
            ..Default::default()
        },
    )?
    .sort_by_exprs([col(DATETIME), col(REGION)], [false, false], false, false)
    .collect()?;

    ensure_unique_keys(&combined)?;
    Ok(combined)
}

/// `NortheastClimate.csv` -> `Northeast`.
pub fn extract_region(file: &Path, region_re: &Regex) -> Result<String> {
    let file_name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    region_re
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            PipelineError::RegionExtraction {
                file: file.display().to_string(),
            }
            .into()
        })
}

fn read_climate_file(file: &Path, region: &str, config: &PipelineConfig) -> Result<DataFrame> {
    let display = file.display().to_string();
    let hourly_rows = hourly_row_count(file, config.skip_rows, config.climate_horizon)?;

    if hourly_rows == 0 {
        return Err(PipelineError::Schema {
            file: display,
            message: "no hourly rows after the header".to_string(),
        }
        .into());
    }
    if hourly_rows < config.climate_horizon {
        warn!(
            "{}: hourly series ends after {} rows, expected {}",
            display, hourly_rows, config.climate_horizon
        );
    }

    let raw = CsvReader::from_path(file)
        .with_context(|| format!("opening {}", display))?
        .has_header(true)
        .with_skip_rows(config.skip_rows)
        .with_n_rows(Some(hourly_rows))
        .infer_schema(Some(hourly_rows.min(100)))
        .finish()
        .with_context(|| format!("reading {}", display))?;

    let times = raw.column(CLIMATE_TIME)?.cast(&DataType::Utf8)?;
    let mut datetimes: Vec<Option<NaiveDateTime>> = Vec::with_capacity(raw.height());
    for (row, value) in times.utf8()?.into_iter().enumerate() {
        let dt = value.and_then(parse_climate_time).ok_or_else(|| PipelineError::Parse {
            file: display.clone(),
            message: format!("row {}: unrecognised time {:?}", row, value),
        })?;
        datetimes.push(Some(dt));
    }

    let mut columns = vec![datetime_series(DATETIME, &datetimes)?];
    columns.push(Series::new(REGION, vec![region; raw.height()]));
    for series in raw.get_columns() {
        if series.name() != CLIMATE_TIME {
            columns.push(numeric_column(series, &display)?);
        }
    }

    debug!("{}: {} hourly rows for {}", display, raw.height(), region);
    Ok(DataFrame::new(columns)?)
}

/// Counts the leading data rows whose `time` field parses, capped at
/// `horizon`. Open-Meteo style exports append a blank line and a daily
/// summary section after the hourly series; counting stops there.
fn hourly_row_count(file: &Path, skip_rows: usize, horizon: usize) -> Result<usize> {
    let mut reader = BufReader::new(
        File::open(file).with_context(|| format!("opening {}", file.display()))?,
    );
    let mut line = String::new();
    for _ in 0..skip_rows {
        line.clear();
        reader.read_line(&mut line)?;
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let time_idx = headers
        .iter()
        .position(|h| h.trim() == CLIMATE_TIME)
        .ok_or_else(|| PipelineError::Schema {
            file: file.display().to_string(),
            message: format!("no {:?} column in header {:?}", CLIMATE_TIME, headers),
        })?;

    let mut count = 0;
    for record in csv_reader.records() {
        if count >= horizon {
            break;
        }
        let record = record?;
        match record.get(time_idx).and_then(parse_climate_time) {
            Some(_) => count += 1,
            None => break,
        }
    }

    Ok(count)
}

fn parse_climate_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

fn ensure_unique_keys(df: &DataFrame) -> Result<()> {
    let millis = datetime_millis(df, DATETIME)?;
    let regions = df.column(REGION)?.utf8()?;
    for i in 1..df.height() {
        if millis[i] == millis[i - 1] && regions.get(i) == regions.get(i - 1) {
            let when = millis[i]
                .and_then(naive_from_millis)
                .map(|dt| dt.to_string())
                .unwrap_or_else(|| "null".to_string());
            return Err(PipelineError::DuplicateKey {
                table: "climate".to_string(),
                key: format!("({}, {})", when, regions.get(i).unwrap_or_default()),
            }
            .into());
        }
    }
    Ok(())
}
