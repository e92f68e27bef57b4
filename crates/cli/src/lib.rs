use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use takeoff_core::export::{self, TakeoffExport};
use takeoff_core::measurement::{measurement_of, perimeter_feet};
use takeoff_core::{
    infer_item_configs, summarize, summarize_by_page_scale, MeasurementSummary, ScaleRegistry,
    TakeoffConfig, TakeoffItemConfig,
};

#[derive(Debug, Parser)]
#[command(name = "takeoff")]
#[command(about = "Quantity takeoff measurements from exported annotations")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the available scale presets.
    Presets {
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print the per-item summary of a takeoff export as JSON.
    Summary {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// Measure everything under this preset id instead of page 1's scale.
        #[arg(long, conflicts_with = "per_page")]
        scale: Option<String>,
        /// Measure each annotation under its own page's scale.
        #[arg(long)]
        per_page: bool,
    },
    /// Write the summary of a takeoff export as CSV.
    Csv {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print the measurement of every annotation as JSON.
    Measure {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeasureOutput<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    item_id: &'a str,
    page_number: u32,
    scale_id: &'a str,
    value: f64,
    unit: String,
    formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    perimeter_feet: Option<f64>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Presets { config } => run_presets(config.as_deref()),
        Commands::Summary { file, config, scale, per_page } => {
            run_summary(&file, config.as_deref(), scale.as_deref(), per_page)
        }
        Commands::Csv { file, output, config } => {
            run_csv(&file, output.as_deref(), config.as_deref())
        }
        Commands::Measure { file, config } => run_measure(&file, config.as_deref()),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_presets(config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let registry = config.scale_registry()?;

    for preset in registry.presets() {
        let marker = if registry.default_id() == Some(preset.id.as_str()) { "*" } else { "" };
        println!("{}\t{}\t{:.4}{marker}", preset.id, preset.label, preset.pixels_per_foot);
    }

    Ok(())
}

fn run_summary(
    file: &Path,
    config: Option<&Path>,
    scale: Option<&str>,
    per_page: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let export = load_export(file)?;
    let registry = registry_for(&config, &export)?;
    let items = items_for(&config, &export);

    let summary = if let Some(id) = scale {
        let preset =
            registry.get(id).with_context(|| format!("unknown scale preset: {id}"))?;
        summarize(&export.annotations, preset, &items)
    } else if per_page {
        summarize_by_page_scale(&export.annotations, &registry, &items)
    } else {
        page_one_summary(&export, &registry, &items)
    };

    let json = serde_json::to_string_pretty(&summary)?;
    println!("{json}");

    Ok(())
}

fn run_csv(file: &Path, output: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let mut export = load_export(file)?;
    let registry = registry_for(&config, &export)?;
    let items = items_for(&config, &export);
    export.summary = page_one_summary(&export, &registry, &items);

    match output {
        Some(output) => {
            export::write_csv(output, &export)
                .with_context(|| format!("failed to write CSV to {}", output.display()))?;
            println!("{}", output.display());
        }
        None => println!("{}", export.to_csv()?),
    }

    Ok(())
}

fn run_measure(file: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let export = load_export(file)?;
    let registry = registry_for(&config, &export)?;

    let rows: Vec<MeasureOutput<'_>> = export
        .annotations
        .iter()
        .map(|annotation| {
            let scale = registry.resolve(annotation.page_number());
            let measurement = measurement_of(annotation, scale);
            MeasureOutput {
                id: annotation.id().as_str(),
                kind: annotation.kind().as_str(),
                item_id: annotation.item_id(),
                page_number: annotation.page_number(),
                scale_id: &scale.id,
                value: measurement.value,
                unit: measurement.unit,
                formatted: measurement.formatted,
                perimeter_feet: perimeter_feet(annotation, scale),
            }
        })
        .collect();

    let json = serde_json::to_string_pretty(&rows)?;
    println!("{json}");

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TakeoffConfig> {
    match path {
        Some(path) => TakeoffConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(TakeoffConfig::default()),
    }
}

fn load_export(path: &Path) -> Result<TakeoffExport> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    let mut export = export::read_json(path)
        .with_context(|| format!("failed to read takeoff export {}", path.display()))?;

    export.annotations.retain(|annotation| match annotation.validate() {
        Ok(()) => true,
        Err(e) => {
            log::warn!("skipping annotation {}: {e}", annotation.id());
            false
        }
    });

    Ok(export)
}

fn registry_for(config: &TakeoffConfig, export: &TakeoffExport) -> Result<ScaleRegistry> {
    let mut registry = config.scale_registry()?;
    registry.load_page_scales(export.page_scales.clone());
    Ok(registry)
}

/// Configured catalog, or one derived from the export when none is configured
fn items_for(config: &TakeoffConfig, export: &TakeoffExport) -> Vec<TakeoffItemConfig> {
    if config.items.is_empty() {
        infer_item_configs(&export.annotations)
    } else {
        config.items.clone()
    }
}

fn page_one_summary(
    export: &TakeoffExport,
    registry: &ScaleRegistry,
    items: &[TakeoffItemConfig],
) -> Vec<MeasurementSummary> {
    summarize(&export.annotations, registry.resolve(1), items)
}
