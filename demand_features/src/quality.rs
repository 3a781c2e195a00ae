use crate::error::PipelineError;
use crate::models::{DATETIME, REGION};
use crate::time_features::{datetime_millis, naive_from_millis};
use anyhow::Result;
use polars::prelude::*;
use std::cmp::Ordering;

#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub rows: usize,
    pub regions: usize,
    /// Null counts of columns that are allowed to be null (unmatched climate
    /// rows), only those with at least one null.
    pub null_counts: Vec<(String, usize)>,
}

impl QualityReport {
    pub fn print(&self) {
        println!("\n🔍 Data Quality Verification");
        println!("{}", "=".repeat(60));
        println!("    ✅ No duplicate (datetime, region) keys");
        println!("    ✅ Data is properly sorted");
        println!("    ✅ Lag columns complete");
        println!("    📊 Total records: {}", self.rows);
        println!("    📊 Unique regions: {}", self.regions);
        if self.null_counts.is_empty() {
            println!("    ✅ No missing climate values");
        } else {
            for (name, count) in &self.null_counts {
                println!("    ⚠️  {} nulls in {}", count, name);
            }
        }
    }
}

/// Checks the merged, lag-featured table: the composite key is unique and
/// ascending, and no lag column holds a null. Other nulls are only counted.
pub fn verify_processed(df: &DataFrame, lag_columns: &[String]) -> Result<QualityReport> {
    let millis = datetime_millis(df, DATETIME)?;
    let regions = df.column(REGION)?.utf8()?;

    for i in 1..df.height() {
        let prev = (millis[i - 1], regions.get(i - 1));
        let next = (millis[i], regions.get(i));
        match prev.cmp(&next) {
            Ordering::Less => {}
            Ordering::Equal => {
                let when = next
                    .0
                    .and_then(naive_from_millis)
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "null".to_string());
                return Err(PipelineError::DuplicateKey {
                    table: "processed data".to_string(),
                    key: format!("({}, {})", when, next.1.unwrap_or_default()),
                }
                .into());
            }
            Ordering::Greater => {
                return Err(PipelineError::Unsorted {
                    table: "processed data".to_string(),
                }
                .into())
            }
        }
    }

    for name in lag_columns {
        let nulls = df.column(name)?.null_count();
        if nulls > 0 {
            return Err(PipelineError::IncompleteLag {
                column: name.clone(),
                nulls,
            }
            .into());
        }
    }

    let null_counts = df
        .get_columns()
        .iter()
        .filter(|s| !lag_columns.iter().any(|lag| lag == s.name()))
        .map(|s| (s.name().to_string(), s.null_count()))
        .filter(|(_, count)| *count > 0)
        .collect();

    Ok(QualityReport {
        rows: df.height(),
        regions: regions.n_unique()?,
        null_counts,
    })
}
