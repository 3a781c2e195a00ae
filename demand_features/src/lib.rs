pub mod climate_loader;
pub mod demand_loader;
pub mod error;
pub mod holidays;
pub mod lag_features;
pub mod merger;
pub mod models;
pub mod pipeline;
pub mod quality;
pub mod time_features;

#[cfg(test)]
mod test_support;

pub use climate_loader::load_climate_data;
pub use demand_loader::load_zonal_demand;
pub use error::PipelineError;
pub use holidays::HolidayCalendar;
pub use lag_features::{create_lag_features, LagConfig};
pub use merger::{melt_zonal_demand, merge_demand_climate};
pub use models::{PipelineConfig, ZoneSet};
pub use pipeline::{Pipeline, PipelineSummary};
pub use quality::{verify_processed, QualityReport};
pub use time_features::add_time_features;
