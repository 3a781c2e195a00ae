use crate::error::PipelineError;
use crate::time_features::{datetime_millis, naive_from_millis};
use anyhow::Result;
use polars::prelude::*;
use std::collections::HashMap;

const HOUR_MS: i64 = 3_600_000;

#[derive(Debug, Clone)]
pub struct LagConfig {
    pub target: String,
    pub lags: Vec<usize>,
    /// Count positions within each value of this column instead of across
    /// the whole table.
    pub group_by: Option<String>,
    /// Datetime column that must advance by exactly one hour between
    /// consecutive rows of a series.
    pub contiguity: Option<String>,
}

impl LagConfig {
    pub fn new(target: impl Into<String>, lags: Vec<usize>) -> Self {
        Self {
            target: target.into(),
            lags,
            group_by: None,
            contiguity: None,
        }
    }

    pub fn grouped_by(mut self, column: impl Into<String>) -> Self {
        self.group_by = Some(column.into());
        self
    }

    pub fn hourly(mut self, column: impl Into<String>) -> Self {
        self.contiguity = Some(column.into());
        self
    }

    pub fn column_name(&self, lag: usize) -> String {
        format!("{}_lag_{}", self.target, lag)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.lags.iter().map(|&lag| self.column_name(lag)).collect()
    }
}

impl Default for LagConfig {
    fn default() -> Self {
        Self::new(crate::models::ONTARIO_DEMAND, vec![24, 48, 168])
    }
}

/// Adds `<target>_lag_<k>` for every k, holding the target value k positions
/// earlier in the current row order, then drops every row where any lag is
/// null. The caller is responsible for sorting first.
pub fn create_lag_features(mut df: DataFrame, config: &LagConfig) -> Result<DataFrame> {
    if config.lags.is_empty() || config.lags.contains(&0) {
        return Err(PipelineError::InvalidConfig {
            message: format!("lags must be positive and non-empty, got {:?}", config.lags),
        }
        .into());
    }

    let target = df.column(&config.target)?.cast(&DataType::Float64)?;
    let target = target.f64()?;

    // Row indices of each series, in table order.
    let series_rows = series_row_indices(&df, config.group_by.as_deref())?;

    if let Some(time_col) = &config.contiguity {
        check_hourly(&df, time_col, &series_rows)?;
    }

    for &lag in &config.lags {
        let mut values: Vec<Option<f64>> = vec![None; df.height()];
        for rows in series_rows.values() {
            for (pos, &row) in rows.iter().enumerate().skip(lag) {
                values[row] = target.get(rows[pos - lag]);
            }
        }
        df.with_column(Series::new(&config.column_name(lag), values))?;
    }

    let lag_columns = config.column_names();
    Ok(df.drop_nulls(Some(lag_columns.as_slice()))?)
}

fn series_row_indices(df: &DataFrame, group_by: Option<&str>) -> Result<HashMap<String, Vec<usize>>> {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();

    match group_by {
        None => {
            groups.insert(String::new(), (0..df.height()).collect());
        }
        Some(name) => {
            let keys = df.column(name)?.cast(&DataType::Utf8)?;
            for (row, key) in keys.utf8()?.into_iter().enumerate() {
                groups
                    .entry(key.unwrap_or_default().to_string())
                    .or_default()
                    .push(row);
            }
        }
    }

    Ok(groups)
}

fn check_hourly(df: &DataFrame, time_col: &str, series_rows: &HashMap<String, Vec<usize>>) -> Result<()> {
    let millis = datetime_millis(df, time_col)?;
    let describe = |ms: Option<i64>| {
        ms.and_then(naive_from_millis)
            .map(|dt| dt.to_string())
            .unwrap_or_else(|| "null".to_string())
    };

    for (group, rows) in series_rows {
        for pair in rows.windows(2) {
            let (prev, next) = (millis[pair[0]], millis[pair[1]]);
            let contiguous = matches!((prev, next), (Some(p), Some(n)) if n - p == HOUR_MS);
            if !contiguous {
                return Err(PipelineError::NonContiguous {
                    group: if group.is_empty() { time_col.to_string() } else { group.clone() },
                    after: describe(prev),
                    next: describe(next),
                }
                .into());
            }
        }
    }

    Ok(())
}
