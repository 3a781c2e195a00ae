use crate::error::PipelineError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DATETIME: &str = "datetime";
pub const REGION: &str = "region";
pub const DATE: &str = "Date";
pub const HOUR: &str = "Hour";
pub const ONTARIO_DEMAND: &str = "Ontario Demand";
pub const ZONAL_DEMAND: &str = "zonal_demand";
pub const CLIMATE_TIME: &str = "time";

/// Calendar columns added by `add_time_features`, in output order.
pub const TIME_FEATURES: [&str; 6] = [
    "hour",
    "day_of_week",
    "month",
    "day_of_year",
    "is_holiday",
    "is_weekend",
];

/// Named demand zones. The same list drives demand schema checks and the
/// wide-to-long reshape, so both sides always agree on the zone columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneSet(Vec<String>);

impl ZoneSet {
    pub fn new<I, S>(zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(zones.into_iter().map(Into::into).collect())
    }

    /// The ten IESO transmission zones in report column order.
    pub fn ontario() -> Self {
        Self::new([
            "Northwest",
            "Northeast",
            "Ottawa",
            "East",
            "Toronto",
            "Essa",
            "Bruce",
            "Southwest",
            "Niagara",
            "West",
        ])
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, zone: &str) -> bool {
        self.0.iter().any(|z| z == zone)
    }
}

impl Default for ZoneSet {
    fn default() -> Self {
        Self::ontario()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub demand_dir: PathBuf,
    pub demand_pattern: String,
    pub climate_dir: PathBuf,
    pub climate_pattern: String,
    pub output_dir: PathBuf,
    pub combined_file: String,
    pub processed_file: String,
    /// Preamble lines before the column header in every source CSV.
    pub skip_rows: usize,
    /// Upper bound on hourly rows read from one climate file.
    pub climate_horizon: usize,
    pub zones: ZoneSet,
    pub lag_target: String,
    pub lags: Vec<usize>,
    pub holiday_first_year: i32,
    pub holiday_last_year: i32,
    pub save_parquet: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            demand_dir: PathBuf::from("."),
            demand_pattern: "HourlyZonalDemand/PUB_DemandZonal_*.csv".to_string(),
            climate_dir: PathBuf::from("../ClimateData"),
            climate_pattern: "*Climate.csv".to_string(),
            output_dir: PathBuf::from("."),
            combined_file: "combined_zonal_demand.csv".to_string(),
            processed_file: "processed_data.csv".to_string(),
            skip_rows: 3,
            climate_horizon: 63_672,
            zones: ZoneSet::ontario(),
            lag_target: ONTARIO_DEMAND.to_string(),
            lags: vec![24, 48, 168],
            holiday_first_year: 2018,
            holiday_last_year: 2025,
            save_parquet: false,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the JSON file named by `PIPELINE_CONFIG`, then the
    /// `DEMAND_DIR` / `CLIMATE_DIR` / `OUTPUT_DIR` / `SAVE_PARQUET` overrides.
    pub fn resolve() -> Result<Self> {
        let mut config = match std::env::var("PIPELINE_CONFIG") {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(dir) = std::env::var("DEMAND_DIR") {
            config.demand_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("CLIMATE_DIR") {
            config.climate_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if std::env::var("SAVE_PARQUET").unwrap_or_default() == "1" {
            config.save_parquet = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing pipeline config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> anyhow::Error {
            PipelineError::InvalidConfig {
                message: message.to_string(),
            }
            .into()
        };

        if self.zones.is_empty() {
            return Err(invalid("zone set is empty"));
        }
        if self.lags.is_empty() {
            return Err(invalid("at least one lag is required"));
        }
        if self.lags.contains(&0) {
            return Err(invalid("lags must be positive"));
        }
        if self.holiday_first_year > self.holiday_last_year {
            return Err(invalid("holiday year range is inverted"));
        }
        if self.climate_horizon == 0 {
            return Err(invalid("climate horizon must be positive"));
        }
        Ok(())
    }

    pub fn demand_glob(&self) -> String {
        self.demand_dir
            .join(&self.demand_pattern)
            .to_string_lossy()
            .into_owned()
    }

    pub fn climate_glob(&self) -> String {
        self.climate_dir
            .join(&self.climate_pattern)
            .to_string_lossy()
            .into_owned()
    }

    pub fn combined_path(&self) -> PathBuf {
        self.output_dir.join(&self.combined_file)
    }

    pub fn processed_path(&self) -> PathBuf {
        self.output_dir.join(&self.processed_file)
    }

    /// Name of the lag column for offset `lag`.
    pub fn lag_column(&self, lag: usize) -> String {
        format!("{}_lag_{}", self.lag_target, lag)
    }
}
