//! Run orchestration: resolve, fetch, derive, render, publish.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use swi_common::{ForecastCycle, OverlayMetadata};
use swi_index::{CalibrationTable, IndexInputs, IndexStrategy, LookupStrategy, PhysicalStrategy};
use swi_render::ClassificationScheme;
use tracing::info;

use crate::config::{IndexConfig, OverlayConfig, StrategyKind, StyleConfig};
use crate::cycle::CycleResolver;
use crate::fetch::SubsetFetcher;
use crate::publish;

/// What a single run accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Published { cycle: ForecastCycle },
    /// No cycle in the probe window is published yet. Previous
    /// artifacts stay in place; the process exits successfully.
    NoCycleAvailable,
}

/// Execute one full overlay run.
pub async fn run(config: &OverlayConfig, now: DateTime<Utc>) -> Result<RunOutcome> {
    // Strategy and style are built first so a bad calibration table or
    // palette fails the run before any network traffic.
    let strategy = build_strategy(&config.index)?;
    let scheme = build_scheme(&config.style)?;

    let fetcher = SubsetFetcher::new(
        &config.source,
        config.region.bbox,
        strategy.required_variables(),
    )?;
    let resolver = CycleResolver::new(config.source.max_probes, config.source.forecast_hour);

    let cycle = match resolver.resolve(now, &fetcher).await {
        Some(cycle) => cycle,
        None => return Ok(RunOutcome::NoCycleAvailable),
    };

    let inputs = fetcher.fetch(&cycle).await?;

    process_and_publish(config, &scheme, strategy.as_ref(), &cycle, &inputs, Utc::now()).await?;

    Ok(RunOutcome::Published { cycle })
}

/// Construct the configured derivation strategy. The calibration table
/// loads here, so a missing table fails the lookup deployment instead
/// of silently falling back to the formula.
pub fn build_strategy(config: &IndexConfig) -> Result<Box<dyn IndexStrategy>> {
    match config.strategy {
        StrategyKind::Physical => Ok(Box::new(PhysicalStrategy::new(
            config.quantile_low,
            config.quantile_high,
        ))),
        StrategyKind::Lookup => {
            let table = CalibrationTable::load(&config.calibration_table)
                .context("Calibration table unavailable")?;
            Ok(Box::new(LookupStrategy::new(
                table,
                config.temperature_source,
                config.sentinel,
            )))
        }
    }
}

pub fn build_scheme(style: &StyleConfig) -> Result<ClassificationScheme> {
    ClassificationScheme::new(style.levels.clone(), &style.colors)
        .context("Invalid classification style")
}

/// Derivation through publication, split from cycle resolution so the
/// artifact path is testable with synthetic inputs.
pub async fn process_and_publish(
    config: &OverlayConfig,
    scheme: &ClassificationScheme,
    strategy: &dyn IndexStrategy,
    cycle: &ForecastCycle,
    inputs: &IndexInputs,
    generated: DateTime<Utc>,
) -> Result<()> {
    let field = strategy
        .derive(inputs)
        .with_context(|| format!("Index derivation failed ({})", strategy.name()))?;

    let image = swi_render::render_field(&field, scheme).context("Overlay rendering failed")?;

    let metadata = OverlayMetadata::new(
        generated,
        cycle.reference_time,
        &config.region.bbox,
        scheme.levels().to_vec(),
    );
    let metadata_json = metadata
        .to_json_pretty()
        .context("Metadata serialization failed")?;

    publish::publish_pair(
        &config.output.image,
        &image,
        &config.output.metadata,
        &metadata_json,
    )
    .await?;

    info!(
        cycle = %cycle.iso8601(),
        image = %config.output.image.display(),
        metadata = %config.output.metadata.display(),
        width = field.nlon(),
        height = field.nlat(),
        "Published overlay"
    );
    Ok(())
}
