use std::path::Path;

use anyhow::{Context, Result};
use github_stats::{Config, Stats, svg};
use tracing::info;
use tracing_subscriber::EnvFilter;

const TEMPLATES_DIR: &str = "templates";
const OUTPUT_DIR: &str = "generated";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("github_stats=info".parse()?))
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        user = config.username(),
        emails = config.emails.len(),
        "collecting GitHub statistics"
    );
    let stats = Stats::new(config);

    let templates = Path::new(TEMPLATES_DIR);
    let output = Path::new(OUTPUT_DIR);

    // Both cards share the same memoized statistics.
    let (languages, overview) = tokio::try_join!(
        async {
            svg::generate_languages(&stats, templates, output)
                .await
                .context("failed to generate languages.svg")
        },
        async {
            svg::generate_overview(&stats, templates, output)
                .await
                .context("failed to generate overview.svg")
        },
    )?;

    info!("{}", stats.summary_text().await);
    info!(
        languages = %languages.display(),
        overview = %overview.display(),
        "all images generated"
    );

    Ok(())
}
