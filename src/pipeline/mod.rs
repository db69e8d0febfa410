//! Pipeline orchestrator: source → normalize → dedupe → aggregate → export.
//!
//! Normalization is split into chunks that run on blocking tasks, bounded by
//! `pipeline.concurrency`. Chunk results are collected in submission order so
//! the deduplicator sees listings in input order ("first seen wins" depends
//! on it).

use crate::aggregate::Aggregator;
use crate::config::AppConfig;
use crate::dedup::Deduplicator;
use crate::export;
use crate::models::{AggregatedGroup, ConfidenceTier, NormalizedListingRecord, RawListingRecord};
use crate::normalize::Normalizer;
use crate::normalize::dates::{Clock, FixedClock, MAX_YEAR, SystemClock};
use crate::source::ListingSource;
use crate::taxonomy::Taxonomy;
use crate::utils::PhaseTimer;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn};

pub struct Pipeline {
    config: AppConfig,
    normalizer: Arc<Normalizer>,
    deduplicator: Deduplicator,
    aggregator: Aggregator,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        let taxonomy = Arc::new(Taxonomy::load_or_degrade(config.taxonomy.path.as_deref()));
        let clock: Arc<dyn Clock> = match config.pipeline.reference_date {
            Some(d) => Arc::new(FixedClock(d)),
            None => Arc::new(SystemClock),
        };
        Self::with_parts(config, taxonomy, clock)
    }

    pub fn with_parts(config: AppConfig, taxonomy: Arc<Taxonomy>, clock: Arc<dyn Clock>) -> Self {
        let normalizer = Normalizer::new(taxonomy, clock, info_span!("normalizer"))
            .with_date_fallback(config.pipeline.date_fallback_current);
        Self {
            normalizer: Arc::new(normalizer),
            deduplicator: Deduplicator::new(info_span!("deduplicator")),
            aggregator: Aggregator::new(info_span!("aggregator")),
            config,
        }
    }

    /// Full run without writing anything.
    pub async fn process(&self, source: &dyn ListingSource) -> Result<PipelineOutput> {
        let raw = {
            let _t = PhaseTimer::start("load");
            source
                .fetch_listings()
                .await
                .with_context(|| format!("Failed to load listings from {}", source.name()))?
        };
        info!("Total raw listings: {}", raw.len());
        let raw_count = raw.len();

        let normalized = {
            let _t = PhaseTimer::start("normalization");
            self.normalize_parallel(raw).await
        };
        info!("Normalized: {} / {} listings", normalized.len(), raw_count);

        let unique = {
            let _t = PhaseTimer::start("deduplication");
            self.deduplicator.deduplicate(normalized.clone())
        };

        let groups = {
            let _t = PhaseTimer::start("aggregation");
            self.aggregator.aggregate(&unique)
        };

        let stats = PipelineStats {
            raw_listings: raw_count,
            normalized: normalized.len(),
            dropped: raw_count - normalized.len(),
            unique: unique.len(),
            groups: groups.len(),
        };

        Ok(PipelineOutput {
            stats,
            normalized,
            unique,
            groups,
        })
    }

    /// Process, then write the table (and optionally the listing sets).
    pub async fn run(&self, source: &dyn ListingSource) -> Result<PipelineOutput> {
        let output = self.process(source).await?;

        let _t = PhaseTimer::start("export");
        let dir = &self.config.output.dir;
        if self.config.output.save_listings {
            export::write_listings_json(&dir.join("normalized_listings.json"), &output.normalized)?;
            export::write_listings_json(&dir.join("unique_listings.json"), &output.unique)?;
        }
        export::write_groups_csv(&dir.join("rental_intelligence.csv"), &output.groups)?;
        export::write_groups_json(&dir.join("rental_intelligence.json"), &output.groups)?;

        Ok(output)
    }

    /// Chunked normalization on the blocking pool, results in input order.
    pub async fn normalize_parallel(
        &self,
        raw: Vec<RawListingRecord>,
    ) -> Vec<NormalizedListingRecord> {
        let chunk_size = self.config.pipeline.chunk_size.max(1);
        let sem = Arc::new(Semaphore::new(self.config.pipeline.concurrency.max(1)));
        let mut handles = Vec::new();

        let mut rest = raw;
        while !rest.is_empty() {
            let tail = rest.split_off(chunk_size.min(rest.len()));
            let chunk = std::mem::replace(&mut rest, tail);
            let n = chunk.len();

            let normalizer = Arc::clone(&self.normalizer);
            let sem = Arc::clone(&sem);

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire_owned().await?;
                let out =
                    tokio::task::spawn_blocking(move || normalizer.normalize_all(&chunk)).await?;
                Ok::<_, anyhow::Error>(out)
            });
            handles.push((n, handle));
        }

        let mut out = Vec::new();
        for (i, (n, handle)) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(Ok(records)) => out.extend(records),
                Ok(Err(e)) => warn!("Chunk {} ({} listings) dropped: {:#}", i, n, e),
                Err(e) => error!("Task panic in chunk {} ({} listings): {}", i, n, e),
            }
        }
        out
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStats {
    pub raw_listings: usize,
    pub normalized: usize,
    pub dropped: usize,
    pub unique: usize,
    pub groups: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub stats: PipelineStats,
    pub normalized: Vec<NormalizedListingRecord>,
    pub unique: Vec<NormalizedListingRecord>,
    pub groups: Vec<AggregatedGroup>,
}

/// Collection targets checked in the run summary.
pub const TARGET_UNIQUE_LISTINGS: usize = 500;
pub const TARGET_RECENT_PCT: f64 = 40.0;

/// Coverage figures printed after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub unique_listings: usize,
    pub year_counts: BTreeMap<i32, usize>,
    /// Share of dated unique listings from the two most recent window years
    pub recent_pct: f64,
    pub cities: Vec<CitySummary>,
    pub confidence_counts: BTreeMap<ConfidenceTier, usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitySummary {
    pub city: String,
    pub neighborhoods: usize,
    pub housing_types: usize,
    pub year_min: i32,
    pub year_max: i32,
    pub groups: usize,
}

impl PipelineOutput {
    pub fn summary(&self) -> RunSummary {
        let mut year_counts = BTreeMap::new();
        for l in &self.unique {
            if let Some(y) = l.year {
                *year_counts.entry(y).or_insert(0usize) += 1;
            }
        }

        let dated: usize = year_counts.values().sum();
        let recent_years = (MAX_YEAR - 1)..=MAX_YEAR;
        let recent: usize = year_counts
            .iter()
            .filter(|(y, _)| recent_years.contains(*y))
            .map(|(_, n)| n)
            .sum();
        let recent_pct = if dated > 0 {
            recent as f64 / dated as f64 * 100.0
        } else {
            0.0
        };

        let mut by_city: BTreeMap<&str, Vec<&AggregatedGroup>> = BTreeMap::new();
        for g in &self.groups {
            by_city.entry(g.city.as_str()).or_default().push(g);
        }
        let cities = by_city
            .into_iter()
            .map(|(city, gs)| {
                let mut hoods: Vec<&str> = gs.iter().map(|g| g.neighborhood.as_str()).collect();
                hoods.sort_unstable();
                hoods.dedup();
                let mut types: Vec<&str> = gs.iter().map(|g| g.housing_type.as_str()).collect();
                types.sort_unstable();
                types.dedup();
                CitySummary {
                    city: city.to_string(),
                    neighborhoods: hoods.len(),
                    housing_types: types.len(),
                    year_min: gs.iter().map(|g| g.year).min().unwrap_or_default(),
                    year_max: gs.iter().map(|g| g.year).max().unwrap_or_default(),
                    groups: gs.len(),
                }
            })
            .collect();

        let mut confidence_counts = BTreeMap::new();
        for g in &self.groups {
            *confidence_counts.entry(g.data_confidence).or_insert(0usize) += 1;
        }

        RunSummary {
            unique_listings: self.unique.len(),
            year_counts,
            recent_pct,
            cities,
            confidence_counts,
        }
    }
}

impl RunSummary {
    pub fn meets_volume_target(&self) -> bool {
        self.unique_listings >= TARGET_UNIQUE_LISTINGS
    }

    pub fn meets_recency_target(&self) -> bool {
        self.recent_pct >= TARGET_RECENT_PCT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use chrono::NaiveDate;

    fn pipeline(concurrency: usize, chunk_size: usize) -> Pipeline {
        let mut config = AppConfig::default();
        config.pipeline.concurrency = concurrency;
        config.pipeline.chunk_size = chunk_size;
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        Pipeline::with_parts(config, Arc::new(Taxonomy::defaults()), Arc::new(FixedClock(today)))
    }

    fn raw(url: &str, hood: &str, price: &str, date: &str) -> RawListingRecord {
        RawListingRecord {
            city: "Douala".into(),
            neighborhood: hood.into(),
            housing_type_raw: "Studio moderne".into(),
            rent_price_raw: price.into(),
            size_raw: "25 m2".into(),
            listing_date: date.into(),
            source_site: "Mapiole".into(),
            listing_url: url.into(),
            ..Default::default()
        }
    }

    fn fixture() -> Vec<RawListingRecord> {
        vec![
            raw("1", "Akwa", "100 000 FCFA/mois", "2025-03-02"),
            raw("2", "Akwa centre", "110k FCFA", "il y a 2 mois"),
            raw("3", "AKWA", "105000 XAF", "mars 2025"),
            raw("4", "Akwa", "500 000 FCFA", "2025-01-20"),
            raw("5", "akwa", "95 000 F CFA", "2025-05-11"),
            // duplicate of 1 after rounding
            raw("6", "Akwa", "100 200 FCFA", "2025-03-09"),
            raw("7", "Bonapriso", "1.2M XAF/an", "15 janvier 2024"),
        ]
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let out = pipeline(2, 2).process(&MemorySource::new(fixture())).await.unwrap();

        assert_eq!(out.stats.raw_listings, 7);
        assert_eq!(out.stats.normalized, 7);
        assert_eq!(out.stats.dropped, 0);
        assert_eq!(out.stats.unique, 6);
        assert!(out.unique.iter().all(|l| l.listing_url != "6"));

        // studio partition has 6 rents; 500k lies outside the IQR fence
        let akwa = out
            .groups
            .iter()
            .find(|g| g.neighborhood == "Akwa" && g.year == 2025)
            .unwrap();
        assert_eq!(akwa.listing_count, 4);
        assert_eq!(akwa.median_monthly_rent_xaf, 102_500.0);
        assert_eq!(akwa.median_rent_per_sqm, Some(4_100.0));

        let bonapriso = out.groups.iter().find(|g| g.neighborhood == "Bonapriso").unwrap();
        assert_eq!(bonapriso.year, 2024);
        assert_eq!(bonapriso.median_monthly_rent_xaf, 100_000.0);
        assert_eq!(bonapriso.data_confidence, ConfidenceTier::Low);
    }

    #[tokio::test]
    async fn test_order_independent_of_concurrency() {
        let serial = pipeline(1, 1000).process(&MemorySource::new(fixture())).await.unwrap();
        let parallel = pipeline(8, 1).process(&MemorySource::new(fixture())).await.unwrap();
        assert_eq!(serial.normalized, parallel.normalized);
        assert_eq!(serial.unique, parallel.unique);
        assert_eq!(serial.groups, parallel.groups);
    }

    #[tokio::test]
    async fn test_run_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = pipeline(2, 3);
        p.config.output.dir = dir.path().to_path_buf();

        p.run(&MemorySource::new(fixture())).await.unwrap();
        for name in [
            "rental_intelligence.csv",
            "rental_intelligence.json",
            "normalized_listings.json",
            "unique_listings.json",
        ] {
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }
    }

    #[tokio::test]
    async fn test_summary() {
        let out = pipeline(2, 2).process(&MemorySource::new(fixture())).await.unwrap();
        let s = out.summary();
        assert_eq!(s.year_counts.get(&2025), Some(&5));
        assert_eq!(s.year_counts.get(&2024), Some(&1));
        assert!((s.recent_pct - 500.0 / 6.0).abs() < 1e-9);
        assert_eq!(s.cities.len(), 1);
        assert_eq!(s.cities[0].city, "douala");
        assert_eq!(s.cities[0].year_min, 2024);
        assert_eq!(s.cities[0].year_max, 2025);
        assert_eq!(s.confidence_counts.values().sum::<usize>(), out.groups.len());
    }

    #[tokio::test]
    async fn test_summary_targets() {
        let out = pipeline(2, 2).process(&MemorySource::new(fixture())).await.unwrap();
        let s = out.summary();
        assert_eq!(s.unique_listings, 6);
        assert!(!s.meets_volume_target());
        assert!(s.meets_recency_target());

        let mut boundary = s.clone();
        boundary.unique_listings = TARGET_UNIQUE_LISTINGS;
        boundary.recent_pct = TARGET_RECENT_PCT;
        assert!(boundary.meets_volume_target());
        assert!(boundary.meets_recency_target());

        boundary.recent_pct = 39.9;
        assert!(!boundary.meets_recency_target());
    }
}
