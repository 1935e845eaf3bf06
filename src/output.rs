//! Report shapes and persistence for scoring runs.
//!
//! Supports JSON logging, JSON files, and CSV append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::city::CityIndex;
use crate::network::{BudgetSelection, Improvement};
use crate::sensitivity::SensitivityResult;
use csv::WriterBuilder;
use std::fs::{self, OpenOptions};
use std::path::Path;

/// City index stamped with the configuration versions that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct CityReport {
    pub metric: String,
    pub features_version: String,
    pub weights_version: String,
    pub generated_at: DateTime<Utc>,
    pub segment_count: usize,
    pub index: CityIndex,
}

impl CityReport {
    pub fn new(
        metric: &str,
        features_version: &str,
        weights_version: &str,
        index: CityIndex,
    ) -> Self {
        Self {
            metric: metric.to_string(),
            features_version: features_version.to_string(),
            weights_version: weights_version.to_string(),
            generated_at: Utc::now(),
            segment_count: index.segment_count,
            index,
        }
    }
}

/// One sweep step, flattened for CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityRow {
    pub metric: String,
    pub group: String,
    pub weight_delta: f64,
    pub group_weight: f64,
    pub city_score: f64,
    pub local_slope: f64,
}

pub fn sensitivity_rows(result: &SensitivityResult) -> Vec<SensitivityRow> {
    result
        .points
        .iter()
        .map(|p| SensitivityRow {
            metric: result.metric.clone(),
            group: result.target_group.clone(),
            weight_delta: p.weight_delta,
            group_weight: p.group_weight,
            city_score: p.city_score,
            local_slope: result.local_slope,
        })
        .collect()
}

/// One selected upgrade, flattened for CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionRow {
    pub rank: usize,
    pub id: String,
    pub length_km: f64,
    pub value: f64,
    pub ratio: f64,
    pub cumulative_km: f64,
    pub budget_km: f64,
}

pub fn selection_rows(selection: &BudgetSelection) -> Vec<SelectionRow> {
    let mut cumulative_km = 0.0;
    selection
        .selected
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cumulative_km += c.length_km;
            SelectionRow {
                rank: i + 1,
                id: c.id.clone(),
                length_km: c.length_km,
                value: c.value,
                ratio: c.ratio,
                cumulative_km,
                budget_km: selection.budget_km,
            }
        })
        .collect()
}

/// Optimizer output together with its before/after estimate.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub generated_at: DateTime<Utc>,
    pub selection: BudgetSelection,
    pub improvement: Improvement,
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes pretty-printed JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &str, value: &T) -> Result<()> {
    if let Some(parent) = Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    debug!(path, "Wrote JSON");
    Ok(())
}

/// Appends rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
