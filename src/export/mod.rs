//! Writers for the market table and the cleaned listing set.
//!
//! `rental_intelligence.csv`:  one flat row per group
//! `rental_intelligence.json`: city / neighborhood / housing_type / year / metrics

use crate::models::{AggregatedGroup, NormalizedListingRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Metrics stored at the leaves of the nested JSON export.
#[derive(Debug, Serialize, PartialEq)]
pub struct GroupMetrics {
    pub median_monthly_rent_xaf: Option<f64>,
    pub p25_monthly_rent_xaf: Option<f64>,
    pub p75_monthly_rent_xaf: Option<f64>,
    pub median_rent_per_sqm: Option<f64>,
    pub listing_count: usize,
    pub rent_volatility_score: Option<f64>,
    pub data_confidence: String,
}

type Nested = BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, GroupMetrics>>>>;

/// Non-finite floats become `null` rather than invalid JSON.
fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

pub fn nest_groups(groups: &[AggregatedGroup]) -> Nested {
    let mut out = Nested::new();
    for g in groups {
        let metrics = GroupMetrics {
            median_monthly_rent_xaf: finite(g.median_monthly_rent_xaf),
            p25_monthly_rent_xaf: finite(g.p25_monthly_rent_xaf),
            p75_monthly_rent_xaf: finite(g.p75_monthly_rent_xaf),
            median_rent_per_sqm: g.median_rent_per_sqm.and_then(finite),
            listing_count: g.listing_count,
            rent_volatility_score: finite(g.rent_volatility_score),
            data_confidence: g.data_confidence.to_string(),
        };
        out.entry(g.city.clone())
            .or_default()
            .entry(g.neighborhood.clone())
            .or_default()
            .entry(g.housing_type.clone())
            .or_default()
            .insert(g.year.to_string(), metrics);
    }
    out
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let f = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    Ok(BufWriter::new(f))
}

pub fn write_groups_csv(path: &Path, groups: &[AggregatedGroup]) -> Result<()> {
    let mut w = csv::Writer::from_writer(create(path)?);
    // serialize() skips the header row for an empty table, so write it by hand
    w.write_record([
        "city",
        "neighborhood",
        "housing_type",
        "year",
        "median_monthly_rent_xaf",
        "p25_monthly_rent_xaf",
        "p75_monthly_rent_xaf",
        "median_rent_per_sqm",
        "rent_volatility_score",
        "listing_count",
        "data_confidence",
    ])?;
    for g in groups {
        w.write_record([
            g.city.clone(),
            g.neighborhood.clone(),
            g.housing_type.clone(),
            g.year.to_string(),
            g.median_monthly_rent_xaf.to_string(),
            g.p25_monthly_rent_xaf.to_string(),
            g.p75_monthly_rent_xaf.to_string(),
            g.median_rent_per_sqm.map(|v| v.to_string()).unwrap_or_default(),
            g.rent_volatility_score.to_string(),
            g.listing_count.to_string(),
            g.data_confidence.to_string(),
        ])?;
    }
    w.flush()?;
    info!("Exported CSV to {:?} ({} rows)", path, groups.len());
    Ok(())
}

pub fn write_groups_json(path: &Path, groups: &[AggregatedGroup]) -> Result<()> {
    serde_json::to_writer_pretty(create(path)?, &nest_groups(groups))
        .with_context(|| format!("Failed to write {:?}", path))?;
    info!("Exported JSON to {:?}", path);
    Ok(())
}

pub fn write_listings_json(path: &Path, listings: &[NormalizedListingRecord]) -> Result<()> {
    serde_json::to_writer_pretty(create(path)?, listings)
        .with_context(|| format!("Failed to write {:?}", path))?;
    info!("Saved {} listings to {:?}", listings.len(), path);
    Ok(())
}
