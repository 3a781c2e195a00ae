use anyhow::Result;
use demand_features::{Pipeline, PipelineConfig};
use log::info;
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Set Rayon to use all available cores for the per-file loads
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()?;

    println!("🚀 IESO Zonal Demand & Climate Feature Pipeline");
    println!("Using {} CPU cores", num_cpus::get());
    println!("{}", "=".repeat(60));

    let config = PipelineConfig::resolve()?;
    info!(
        "demand: {}, climate: {}, output: {}",
        config.demand_glob(),
        config.climate_glob(),
        config.processed_path().display()
    );

    let start = Instant::now();
    let summary = Pipeline::new(config).run()?;

    println!("\n{}", "=".repeat(60));
    println!("📊 Demand rows:    {}", summary.demand_rows);
    println!("📊 Climate rows:   {}", summary.climate_rows);
    println!("📊 Merged rows:    {}", summary.merged_rows);
    println!("📊 Output rows:    {}", summary.output_rows);
    println!("✅ Processing complete in {:?}!", start.elapsed());

    Ok(())
}
