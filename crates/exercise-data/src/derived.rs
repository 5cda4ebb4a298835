//! Derived columns computed from a normalized [`Table`].
//!
//! Every function here maps absent input cells to absent output cells. No
//! absent cell is ever read as zero, and nothing is interpolated.

use exercise_core::error::Result;
use exercise_core::models::{Column, Table};

pub const PACE: &str = "pace_min_per_km";
pub const CADENCE_RPM: &str = "cadence_rpm";
pub const PRESSURE_HPA: &str = "pressure_hpa";

/// Columns smoothed by [`add_smoothed`].
pub const SMOOTHED_COLUMNS: [Column; 4] = [
    Column::HeartRate,
    Column::BaroAltitude,
    Column::GpsAltitude,
    Column::Speed,
];

/// Pace in minutes per kilometre from speed in metres per second.
///
/// Absent or non-positive speeds give an absent pace.
pub fn pace_min_per_km(speed: &[Option<f64>]) -> Vec<Option<f64>> {
    speed
        .iter()
        .map(|s| s.filter(|v| *v > 0.0).map(|v| 1.0 / v * 1000.0 / 60.0))
        .collect()
}

/// Cadence reported in Hz converted to revolutions per minute.
pub fn cadence_rpm(cadence: &[Option<f64>]) -> Vec<Option<f64>> {
    scale(cadence, 60.0)
}

/// Pressure in pascal converted to hectopascal.
pub fn pressure_hpa(pressure: &[Option<f64>]) -> Vec<Option<f64>> {
    pressure.iter().map(|v| v.map(|x| x / 100.0)).collect()
}

fn scale(values: &[Option<f64>], factor: f64) -> Vec<Option<f64>> {
    values.iter().map(|v| v.map(|x| x * factor)).collect()
}

/// Centred rolling mean over `window` rows.
///
/// The mean uses only the present cells inside the window. A cell that is
/// absent in the input stays absent in the output. A window of `0` or `1`
/// returns the input unchanged.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window <= 1 {
        return values.to_vec();
    }
    let before = (window - 1) / 2;
    let after = window / 2;

    (0..values.len())
        .map(|i| {
            values[i]?;
            let start = i.saturating_sub(before);
            let end = (i + after).min(values.len() - 1);
            let (sum, count) = values[start..=end]
                .iter()
                .flatten()
                .fold((0.0f64, 0usize), |(sum, count), v| (sum + *v, count + 1));
            Some(sum / count as f64)
        })
        .collect()
}

/// Append pace, cadence in rpm and pressure in hPa.
pub fn add_standard_columns(table: &mut Table) -> Result<()> {
    let pace = pace_min_per_km(table.measurement(Column::Speed));
    let rpm = cadence_rpm(table.measurement(Column::Cadence));
    let hpa = pressure_hpa(table.measurement(Column::Pressure));
    table.add_column(PACE, pace)?;
    table.add_column(CADENCE_RPM, rpm)?;
    table.add_column(PRESSURE_HPA, hpa)?;
    Ok(())
}

/// Append a `<column>_smooth` copy of each of [`SMOOTHED_COLUMNS`].
pub fn add_smoothed(table: &mut Table, window: usize) -> Result<()> {
    for column in SMOOTHED_COLUMNS {
        let smoothed = rolling_mean(table.measurement(column), window);
        table.add_column(format!("{}_smooth", column.name()), smoothed)?;
    }
    Ok(())
}
