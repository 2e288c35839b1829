//! Batch facial emotion classification CLI.

mod args;
mod config;
mod input;
mod output;

use anyhow::Result;
use clap::Parser;
use fer_core::{EmotionClassifier, EmotionTable};
use fer_utils::{configure_telemetry, init_logging};
use log::{info, warn};

use crate::{
    args::ClassifyArgs,
    config::{
        apply_cli_overrides, build_preprocess_config, load_settings, resolved_model_path,
        validate_top_n,
    },
    input::collect_inputs,
    output::{build_records, write_records},
};

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = ClassifyArgs::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    apply_cli_overrides(&mut settings, &args);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let table = EmotionTable::standard();
    validate_top_n(&settings, &table)?;
    let preprocess_config = build_preprocess_config(&settings)?;

    let files = collect_inputs(&args.input)?;
    if files.is_empty() {
        warn!("No files found at {}; nothing to classify", args.input.display());
        write_records(&[], args.json.as_deref())?;
        return Ok(());
    }

    let model_path = resolved_model_path(&settings);
    let input_size = preprocess_config.input_size;
    info!(
        "Loading emotion model from {} at resolution {}x{}",
        model_path.display(),
        input_size.width,
        input_size.height
    );
    let classifier = EmotionClassifier::new(
        &model_path,
        preprocess_config,
        table,
        settings.labeling.top_n,
    )?;

    let jobs = settings.batch.jobs.max(1);
    info!("Processing {} file(s) with {} worker(s)...", files.len(), jobs);
    let report = classifier.classify_batch_parallel(&files, jobs)?;

    for classified in &report.results {
        info!(
            "{} -> {}",
            classified.path.display(),
            classified
                .result
                .labels
                .iter()
                .map(|emotion| emotion.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if !report.failures.is_empty() {
        warn!(
            "{} of {} file(s) could not be classified",
            report.failures.len(),
            report.processed()
        );
    }

    let records = build_records(
        &report,
        classifier.table(),
        settings.labeling.include_scores,
    );
    write_records(&records, args.json.as_deref())?;

    Ok(())
}
