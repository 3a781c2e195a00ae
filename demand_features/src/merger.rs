use crate::error::PipelineError;
use crate::models::{ZoneSet, DATETIME, ONTARIO_DEMAND, REGION, TIME_FEATURES, ZONAL_DEMAND};
use anyhow::Result;
use polars::prelude::*;

/// Identifier columns carried onto every melted row.
pub fn id_columns() -> Vec<&'static str> {
    let mut ids = vec![DATETIME, ONTARIO_DEMAND];
    ids.extend(TIME_FEATURES);
    ids
}

/// Wide-to-long reshape: one row per (timestamp, zone) with the zone's value
/// in `zonal_demand` and the zone name in `region`.
pub fn melt_zonal_demand(demand: &DataFrame, zones: &ZoneSet) -> Result<DataFrame> {
    // An empty value list would make polars melt every non-id column.
    if zones.is_empty() {
        return Err(PipelineError::InvalidConfig {
            message: "zone set is empty".to_string(),
        }
        .into());
    }

    let mut melted = demand.melt(id_columns(), zones.names())?;
    melted.rename("variable", REGION)?;
    melted.rename("value", ZONAL_DEMAND)?;

    let values = melted.column(ZONAL_DEMAND)?.strict_cast(&DataType::Float64)?;
    melted.with_column(values)?;
    Ok(melted)
}

/// Melts the demand table, left-joins climate on (`datetime`, `region`) and
/// sorts by that key. Every melted row survives; unmatched rows carry null
/// climate fields.
pub fn merge_demand_climate(demand: &DataFrame, climate: &DataFrame, zones: &ZoneSet) -> Result<DataFrame> {
    let melted = melt_zonal_demand(demand, zones)?;
    let expected = melted.height();

    let joined = melted.left_join(climate, [DATETIME, REGION], [DATETIME, REGION])?;

    if joined.height() != expected {
        return Err(PipelineError::JoinIntegrity {
            expected,
            actual: joined.height(),
        }
        .into());
    }

    let merged = joined
        .lazy()
        .sort_by_exprs([col(DATETIME), col(REGION)], [false, false], false, false)
        .collect()?;

    Ok(merged)
}
