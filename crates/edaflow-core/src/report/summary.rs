//! Headline figures of a design, as a flow reports them.

use serde::{Deserialize, Serialize};

use super::{AreaEntry, PowerEntry, TimingPath};

/// Which area column counts as "the" area of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaMetric {
    /// Standard-cell area only (post-synthesis).
    Cell,
    /// Cell plus net area, or the placed total.
    Total,
}

/// Arrival, power and area of the top instance after one stage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DesignTotals {
    pub arrival_time: f64,
    pub power: Option<f64>,
    pub area: Option<f64>,
}

/// Arrival time of the worst (first) path; 0 when the report lists none.
pub fn first_arrival(paths: &[TimingPath]) -> f64 {
    paths.first().map_or(0.0, |p| p.arrival_time)
}

pub fn instance_power(entries: &[PowerEntry], instance: &str) -> Option<f64> {
    entries
        .iter()
        .find(|e| e.instance_path == instance)
        .map(|e| e.total)
}

pub fn instance_area(entries: &[AreaEntry], instance: &str, metric: AreaMetric) -> Option<f64> {
    let entry = entries.iter().find(|e| e.instance_path == instance)?;
    match metric {
        AreaMetric::Cell => entry.cell_area.or(Some(entry.total_area)),
        AreaMetric::Total => Some(entry.total_area),
    }
}

pub fn design_totals(
    timing: &[TimingPath],
    power: &[PowerEntry],
    area: &[AreaEntry],
    top: &str,
    metric: AreaMetric,
) -> DesignTotals {
    DesignTotals {
        arrival_time: first_arrival(timing),
        power: instance_power(power, top),
        area: instance_area(area, top, metric),
    }
}
