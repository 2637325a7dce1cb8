use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::parser::patterns::Pattern;

pub const NUMERIC_FEATURES: [&str; 6] = [
    "condition",
    "frame_size",
    "wheel_size",
    "front_travel",
    "rear_travel",
    "age",
];
pub const CATEGORICAL_FEATURES: [&str; 3] = ["type", "material", "suspension_type"];

const MIN_PRICE: f64 = 100.0;
const MAX_PRICE: f64 = 5000.0;
const FALLBACK_YEAR: i32 = 2020;
const MIN_FREQUENCY: usize = 10;
const MISSING: &str = "missing";
const INFREQUENT: &str = "infrequent";

/// One row of the modeling table. Unparseable numbers read as missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingRow {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub price: Option<f64>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub condition: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub frame_size: Option<f64>,
    #[serde(default)]
    pub wheel_size: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub front_travel: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub rear_travel: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub price: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub material: String,
    pub condition: Option<f64>,
    pub frame_size: f64,
    pub wheel_size: f64,
    pub front_travel: Option<f64>,
    pub rear_travel: Option<f64>,
    pub suspension_type: String,
    pub age: f64,
}

impl FeatureRow {
    fn numeric(&self, feature: &str) -> Option<f64> {
        match feature {
            "condition" => self.condition,
            "frame_size" => Some(self.frame_size),
            "wheel_size" => Some(self.wheel_size),
            "front_travel" => self.front_travel,
            "rear_travel" => self.rear_travel,
            "age" => Some(self.age),
            _ => None,
        }
    }

    fn categorical(&self, feature: &str) -> &str {
        match feature {
            "type" => &self.kind,
            "material" => &self.material,
            "suspension_type" => &self.suspension_type,
            _ => MISSING,
        }
    }
}

pub fn load_listings(path: &Path) -> Result<Vec<ListingRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<ListingRow>, _>>()
        .with_context(|| format!("Malformed row in {}", path.display()))?;
    info!("Loaded {} listings from {}", rows.len(), path.display());
    Ok(rows)
}

/// Filter price outliers and derive the modeling columns.
pub fn engineer(rows: Vec<ListingRow>, reference_year: i32) -> Vec<FeatureRow> {
    let kept: Vec<ListingRow> = rows
        .into_iter()
        .filter(|r| r.price.is_some_and(|p| p > MIN_PRICE && p < MAX_PRICE))
        .collect();

    let wheels: Vec<Option<f64>> = kept
        .par_iter()
        .map(|r| {
            r.wheel_size
                .as_deref()
                .and_then(|w| Pattern::Decimal.find(w))
                .and_then(|w| w.parse().ok())
        })
        .collect();
    let wheel_median = median(wheels.iter().flatten().copied().collect());

    kept.into_par_iter()
        .zip(wheels)
        .filter_map(|(row, wheel)| {
            let frame_size = row.frame_size?;
            let wheel_size = wheel.or(wheel_median)?;
            let year = row
                .title
                .as_deref()
                .and_then(|t| Pattern::YearInTitle.find(t))
                .and_then(|y| y.parse::<i32>().ok())
                .unwrap_or(FALLBACK_YEAR);
            let suspension = if row.rear_travel.unwrap_or(0.0) > 0.0 {
                "full"
            } else {
                "hardtail"
            };

            Some(FeatureRow {
                price: row.price?,
                kind: category_or_missing(row.kind),
                material: category_or_missing(row.material),
                condition: row.condition.map(|c| c.clamp(1.0, 5.0)),
                frame_size,
                wheel_size,
                front_travel: row.front_travel,
                rear_travel: row.rear_travel,
                suspension_type: suspension.to_string(),
                age: f64::from(reference_year - year),
            })
        })
        .collect()
}

fn category_or_missing(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| MISSING.to_string())
}

/// Middle value; mean of the two middle values for an even count.
fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

// ── Preprocessing ──

/// Median imputation followed by standard scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub feature: String,
    pub median: f64,
    pub mean: f64,
    pub scale: f64,
}

impl NumericScaler {
    fn fit(feature: &str, values: &[Option<f64>]) -> Self {
        let median = median(values.iter().flatten().copied().collect()).unwrap_or(0.0);
        let filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(median)).collect();
        let n = filled.len().max(1) as f64;
        let mean = filled.iter().sum::<f64>() / n;
        let var = filled.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        Self {
            feature: feature.to_string(),
            median,
            mean,
            scale: if std > 0.0 { std } else { 1.0 },
        }
    }

    fn transform(&self, value: Option<f64>) -> f64 {
        (value.unwrap_or(self.median) - self.mean) / self.scale
    }
}

/// One-hot encoding. Categories seen fewer than `MIN_FREQUENCY` times share
/// one `infrequent` column; unseen categories encode as all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub feature: String,
    pub categories: Vec<String>,
    pub infrequent: Vec<String>,
}

impl OneHotEncoder {
    fn fit(feature: &str, values: &[&str]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for &v in values {
            *counts.entry(v).or_default() += 1;
        }
        let (frequent, rare): (Vec<_>, Vec<_>) =
            counts.into_iter().partition(|(_, n)| *n >= MIN_FREQUENCY);
        Self {
            feature: feature.to_string(),
            categories: frequent.into_iter().map(|(c, _)| c.to_string()).collect(),
            infrequent: rare.into_iter().map(|(c, _)| c.to_string()).collect(),
        }
    }

    fn width(&self) -> usize {
        self.categories.len() + usize::from(!self.infrequent.is_empty())
    }

    fn transform_into(&self, value: &str, out: &mut Vec<f64>) {
        let start = out.len();
        out.resize(start + self.width(), 0.0);
        if let Some(i) = self.categories.iter().position(|c| c == value) {
            out[start + i] = 1.0;
        } else if self.infrequent.iter().any(|c| c == value) {
            out[start + self.categories.len()] = 1.0;
        }
    }

    fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .categories
            .iter()
            .map(|c| format!("{}_{}", self.feature, c))
            .collect();
        if !self.infrequent.is_empty() {
            names.push(format!("{}_{}", self.feature, INFREQUENT));
        }
        names
    }
}

/// Fitted column transformer: numeric block then categorical block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    pub numeric: Vec<NumericScaler>,
    pub categorical: Vec<OneHotEncoder>,
}

impl Preprocessor {
    pub fn fit(rows: &[FeatureRow]) -> Self {
        let numeric = NUMERIC_FEATURES
            .iter()
            .map(|f| {
                let values: Vec<Option<f64>> = rows.iter().map(|r| r.numeric(f)).collect();
                NumericScaler::fit(f, &values)
            })
            .collect();
        let categorical = CATEGORICAL_FEATURES
            .iter()
            .map(|f| {
                let values: Vec<&str> = rows.iter().map(|r| r.categorical(f)).collect();
                OneHotEncoder::fit(f, &values)
            })
            .collect();
        Self {
            numeric,
            categorical,
        }
    }

    pub fn transform(&self, rows: &[FeatureRow]) -> Vec<Vec<f64>> {
        rows.par_iter()
            .map(|row| {
                let mut out: Vec<f64> = self
                    .numeric
                    .iter()
                    .map(|s| s.transform(row.numeric(&s.feature)))
                    .collect();
                for enc in &self.categorical {
                    enc.transform_into(row.categorical(&enc.feature), &mut out);
                }
                out
            })
            .collect()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|s| s.feature.clone())
            .chain(self.categorical.iter().flat_map(|e| e.feature_names()))
            .collect()
    }
}

/// Value counts per categorical feature, most frequent first.
pub fn category_counts(rows: &[FeatureRow]) -> BTreeMap<&'static str, Vec<(String, usize)>> {
    CATEGORICAL_FEATURES
        .iter()
        .map(|&f| {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for r in rows {
                *counts.entry(r.categorical(f)).or_default() += 1;
            }
            let mut sorted: Vec<(String, usize)> =
                counts.into_iter().map(|(c, n)| (c.to_string(), n)).collect();
            sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            (f, sorted)
        })
        .collect()
}

pub fn write_rows(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_pipeline(path: &Path, pipeline: &Preprocessor) -> Result<()> {
    let json = serde_json::to_string_pretty(pipeline)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

// ── Tests ──
