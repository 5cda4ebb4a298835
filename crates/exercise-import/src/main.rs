mod bootstrap;
mod report;

use std::io::Write;

use anyhow::{bail, Result};
use exercise_core::settings::{FileConfig, Settings};
use exercise_data::derived;
use exercise_data::import::{import_path, ImportOptions, Imported};

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("exercise-import v{} starting", env!("CARGO_PKG_VERSION"));

    if settings.save_config {
        let path = settings.config_path(&FileConfig::default_path());
        FileConfig::from(&settings).save_to(&path)?;
        tracing::info!("Saved options to {}", path.display());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&settings, &mut out)
}

/// Import everything under the configured input and write one report per
/// file. Fails only when no file could be imported at all.
fn run(settings: &Settings, out: &mut impl Write) -> Result<()> {
    let input = settings.input_path();
    let options = ImportOptions {
        mode: settings.input_mode(),
        normalizer: settings.normalizer_config(),
        activity: settings.activity.clone(),
    };
    tracing::info!(
        "Mode: {:?}, resolution: {} ms, input: {}",
        options.mode,
        options.normalizer.resolution_ms,
        input.display()
    );

    let results = import_path(&input, &options);
    if results.is_empty() {
        bail!("No input files found in {}", input.display());
    }

    let json = settings.format == "json";
    let mut documents = Vec::new();
    let mut failures = 0usize;

    for (path, result) in &results {
        match result {
            Ok(Imported::Session(outcome)) => {
                for dropped in outcome.dropped() {
                    tracing::debug!("{}: {}", path.display(), dropped);
                }
                let mut table = outcome.session.to_table();
                derived::add_standard_columns(&mut table)?;
                if let Some(window) = settings.smooth_window {
                    derived::add_smoothed(&mut table, window as usize)?;
                }
                if json {
                    documents.push(report::session_json(path, outcome, &table));
                } else {
                    report::write_session_text(out, path, outcome, &table, settings.max_rows)?;
                }
            }
            Ok(Imported::Intervals { intervals, summary }) => {
                if json {
                    documents.push(report::intervals_json(path, intervals, summary.as_ref()));
                } else {
                    report::write_intervals_text(out, path, intervals, summary.as_ref())?;
                }
            }
            Err(e) => {
                failures += 1;
                if !json {
                    writeln!(out, "== {}\nfailed: {}\n", path.display(), e)?;
                }
            }
        }
    }

    if json {
        serde_json::to_writer_pretty(&mut *out, &documents)?;
        writeln!(out)?;
    }

    if failures == results.len() {
        bail!("None of the {} input files could be imported", failures);
    }
    Ok(())
}
