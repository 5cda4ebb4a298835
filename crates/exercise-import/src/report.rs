use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use exercise_core::formatting::{
    format_cell, format_count, format_duration, percentage, ABSENT,
};
use exercise_core::models::{Column, Table};
use exercise_data::ibi::IbiSummary;
use exercise_data::normalizer::NormalizeOutcome;
use serde_json::json;

// ── Text output ───────────────────────────────────────────────────────────────

/// Print a session summary followed by its table.
///
/// Only columns with at least one present cell are printed; the rest are
/// listed by name.
pub fn write_session_text(
    out: &mut impl Write,
    path: &Path,
    outcome: &NormalizeOutcome,
    table: &Table,
    max_rows: Option<usize>,
) -> std::io::Result<()> {
    let session = &outcome.session;
    let meta = session.metadata();
    let stats = &outcome.stats;

    writeln!(out, "== {}", path.display())?;
    writeln!(
        out,
        "activity: {}  device: {}  start: {}  end: {}  duration: {}",
        meta.activity,
        meta.device.as_deref().unwrap_or(ABSENT),
        rfc3339_or_absent(meta.start_time),
        rfc3339_or_absent(session.end_time()),
        format_duration(session.duration_seconds()),
    )?;
    writeln!(
        out,
        "records: {}  rows: {}  merged: {}  dropped: {}  unparsed: {}",
        format_count(stats.records_read),
        format_count(stats.rows),
        stats.records_merged,
        stats.records_dropped,
        stats.records_unparsed,
    )?;
    if let Some(bpm) = session.mean_beat_bpm() {
        writeln!(
            out,
            "beats: {}  mean R-R heart rate: {:.1} bpm",
            session.beats().len(),
            bpm
        )?;
    }

    let (present, absent): (Vec<_>, Vec<_>) = table
        .columns()
        .iter()
        .partition(|c| c.values.iter().any(Option::is_some));

    for column in &present {
        let count = table.present_count(&column.name);
        let kind = Column::from_name(&column.name)
            .map(|c| c.kind().to_string())
            .unwrap_or_else(|| "derived".to_string());
        writeln!(
            out,
            "  {:<22} {:<10} {:>6} present ({}%)",
            column.name,
            kind,
            count,
            percentage(count as f64, table.len() as f64, 1)
        )?;
    }
    if !absent.is_empty() {
        let names: Vec<&str> = absent.iter().map(|c| c.name.as_str()).collect();
        writeln!(out, "  no values: {}", names.join(", "))?;
    }

    write!(out, "{:<25}", "timestamp")?;
    for column in &present {
        write!(out, " {:>14}", truncate(&column.name, 14))?;
    }
    writeln!(out)?;

    let limit = max_rows.unwrap_or(table.len()).min(table.len());
    for (i, ts) in table.timestamps().iter().take(limit).enumerate() {
        write!(out, "{:<25}", ts.to_rfc3339())?;
        for column in &present {
            write!(out, " {:>14}", format_cell(column.values[i], 3))?;
        }
        writeln!(out)?;
    }
    if limit < table.len() {
        writeln!(out, "... {} more rows", table.len() - limit)?;
    }
    writeln!(out)
}

/// Print a summary of an interval-only import.
pub fn write_intervals_text(
    out: &mut impl Write,
    path: &Path,
    intervals: &[f64],
    summary: Option<&IbiSummary>,
) -> std::io::Result<()> {
    writeln!(out, "== {}", path.display())?;
    match summary {
        Some(s) => writeln!(
            out,
            "R-R intervals: {}  mean: {:.1} ms  min: {:.0} ms  max: {:.0} ms  mean heart rate: {:.1} bpm",
            s.count, s.mean_ibi_ms, s.min_ibi_ms, s.max_ibi_ms, s.mean_bpm
        )?,
        None => writeln!(out, "R-R intervals: {} (none usable)", intervals.len())?,
    }
    writeln!(out)
}

fn rfc3339_or_absent(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ABSENT.to_string())
}

fn truncate(s: &str, width: usize) -> &str {
    match s.char_indices().nth(width) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── JSON output ───────────────────────────────────────────────────────────────

/// One JSON document per session; absent cells are `null`.
pub fn session_json(path: &Path, outcome: &NormalizeOutcome, table: &Table) -> serde_json::Value {
    let stats = &outcome.stats;
    json!({
        "source": path.display().to_string(),
        "metadata": outcome.session.metadata(),
        "stats": {
            "records_read": stats.records_read,
            "records_dropped": stats.records_dropped,
            "records_merged": stats.records_merged,
            "records_unparsed": stats.records_unparsed,
            "rows": stats.rows,
        },
        "diagnostics": outcome.diagnostics.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
        "columns": table.column_names(),
        "rows": table.to_records(),
        "beats": outcome.session.beats(),
        "unparsed": outcome.unparsed,
    })
}

pub fn intervals_json(path: &Path, intervals: &[f64], summary: Option<&IbiSummary>) -> serde_json::Value {
    json!({
        "source": path.display().to_string(),
        "intervals_ms": intervals,
        "summary": summary.map(|s| json!({
            "count": s.count,
            "mean_ibi_ms": s.mean_ibi_ms,
            "mean_bpm": s.mean_bpm,
            "min_ibi_ms": s.min_ibi_ms,
            "max_ibi_ms": s.max_ibi_ms,
        })),
    })
}
