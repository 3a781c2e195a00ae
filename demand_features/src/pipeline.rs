use crate::climate_loader::load_climate_data;
use crate::demand_loader::{load_zonal_demand, write_csv};
use crate::holidays::HolidayCalendar;
use crate::lag_features::{create_lag_features, LagConfig};
use crate::merger::merge_demand_climate;
use crate::models::{PipelineConfig, DATETIME, REGION};
use crate::quality::{verify_processed, QualityReport};
use crate::time_features::add_time_features;
use anyhow::{Context, Result};
use log::warn;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Pipeline {
    config: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub demand_rows: usize,
    pub climate_rows: usize,
    pub merged_rows: usize,
    pub output_rows: usize,
    pub output_path: PathBuf,
    pub quality: QualityReport,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs every stage and writes `processed_data.csv`. Any failure aborts
    /// before the artifact is moved into place.
    pub fn run(&self) -> Result<PipelineSummary> {
        self.config.validate()?;
        let calendar =
            HolidayCalendar::ontario(self.config.holiday_first_year..=self.config.holiday_last_year)?;

        println!("\n📥 Step 1: Loading zonal demand...");
        let demand = load_zonal_demand(&self.config)?;
        let demand = add_time_features(demand, &calendar)?;
        println!("📊 Demand DataFrame shape: {:?}", demand.shape());

        println!("\n🌦️  Step 2: Loading climate data...");
        let climate = load_climate_data(&self.config)?;
        println!("📊 Climate DataFrame shape: {:?}", climate.shape());
        println!("🔑 Climate key columns: [{}, {}]", DATETIME, REGION);
        println!("Sample of climate data:\n{}", climate.head(Some(5)));

        println!("\n🔗 Step 3: Merging demand and climate...");
        let merged = merge_demand_climate(&demand, &climate, &self.config.zones)?;
        let merged_rows = merged.height();
        println!("📊 Merged DataFrame shape: {:?}", merged.shape());
        println!("🔑 Merged key columns: [{}, {}]", DATETIME, REGION);

        println!("\n⏪ Step 4: Creating lag features for {}...", self.config.lag_target);
        let lag_config = LagConfig::new(self.config.lag_target.clone(), self.config.lags.clone())
            .grouped_by(REGION)
            .hourly(DATETIME);
        let lagged = create_lag_features(merged, &lag_config)?;
        println!(
            "📊 {} rows kept, {} dropped inside the lag horizon",
            lagged.height(),
            merged_rows - lagged.height()
        );

        let quality = verify_processed(&lagged, &lag_config.column_names())?;
        quality.print();

        println!("\n💾 Step 5: Saving processed data...");
        let mut output = key_columns_first(&lagged)?;
        let output_path = self.persist(&mut output)?;
        println!("✅ Data processing complete. Processed data saved to {}", output_path.display());

        Ok(PipelineSummary {
            demand_rows: demand.height(),
            climate_rows: climate.height(),
            merged_rows,
            output_rows: output.height(),
            output_path,
            quality,
        })
    }

    /// Stages every artifact next to its final path and only then moves them
    /// into place, CSV first. Staging files are removed on failure.
    fn persist(&self, output: &mut DataFrame) -> Result<PathBuf> {
        let final_path = self.config.processed_path();
        let csv_staging = final_path.with_extension("csv.tmp");
        let parquet = self.config.save_parquet.then(|| {
            (
                final_path.with_extension("parquet"),
                final_path.with_extension("parquet.tmp"),
            )
        });

        let outcome = stage_and_commit(output, &final_path, &csv_staging, parquet.as_ref());
        if outcome.is_err() {
            let staged = std::iter::once(&csv_staging).chain(parquet.as_ref().map(|(_, tmp)| tmp));
            for path in staged {
                if path.exists() {
                    if let Err(e) = fs::remove_file(path) {
                        warn!("could not remove {}: {}", path.display(), e);
                    }
                }
            }
        }
        outcome.map(|_| final_path)
    }
}

fn stage_and_commit(
    output: &mut DataFrame,
    final_path: &Path,
    csv_staging: &Path,
    parquet: Option<&(PathBuf, PathBuf)>,
) -> Result<()> {
    write_csv(output, csv_staging)?;

    if let Some((parquet_path, parquet_staging)) = parquet {
        println!("📦 Saving Parquet: {}", parquet_path.display());
        let file = fs::File::create(parquet_staging)
            .with_context(|| format!("creating {}", parquet_staging.display()))?;
        ParquetWriter::new(file).finish(output)?;
    }

    fs::rename(csv_staging, final_path)
        .with_context(|| format!("moving {} into place", final_path.display()))?;
    if let Some((parquet_path, parquet_staging)) = parquet {
        fs::rename(parquet_staging, parquet_path)
            .with_context(|| format!("moving {} into place", parquet_path.display()))?;
    }
    Ok(())
}

/// Puts the composite key (`datetime`, `region`) in front, the rest in
/// their current order.
fn key_columns_first(df: &DataFrame) -> Result<DataFrame> {
    let mut order = vec![DATETIME.to_string(), REGION.to_string()];
    order.extend(
        df.get_column_names()
            .into_iter()
            .filter(|name| *name != DATETIME && *name != REGION)
            .map(str::to_string),
    );
    Ok(df.select(order)?)
}
