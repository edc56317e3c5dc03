use anyhow::Context;
use sequin_config::StressConfig;
use sequin_stress::{StressRunner, smoke};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => StressConfig::load(path.clone())
            .with_context(|| format!("failed to load config from {path}"))?,
        None => StressConfig::default(),
    };

    // RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    smoke().context("smoke checks failed")?;
    info!("smoke checks passed");

    let report = StressRunner::new(config).run().context("stress run failed")?;
    info!(
        readers = report.readers,
        reads = report.reads,
        elapsed = ?report.elapsed,
        "all readers done"
    );

    // number of stores the writer got through while the readers ran
    println!("{}", report.stores);
    Ok(())
}
