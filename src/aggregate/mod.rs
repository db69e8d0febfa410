//! Normalized listings → market table.
//!
//! 1. keep listings with price, housing type and date
//! 2. drop IQR outliers per housing type (types with < 4 listings untouched)
//! 3. group by (city, neighborhood, housing_type, year)
//! 4. per group: median / p25 / p75 rent, median rent per m², volatility,
//!    listing count, confidence tier

pub mod stats;

use crate::models::{AggregatedGroup, ConfidenceTier, NormalizedListingRecord};
use std::collections::{BTreeMap, HashMap};
use tracing::{Span, debug, info, warn};

/// Minimum listings per housing type before outlier trimming applies.
const MIN_OUTLIER_SAMPLE: usize = 4;
const IQR_FENCE: f64 = 1.5;

/// Sort key (city, year, neighborhood, housing_type). It is also the group
/// key reordered, so iteration over the map yields the output order.
type GroupKey = (String, i32, String, String);

pub struct Aggregator {
    span: Span,
}

impl Aggregator {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    pub fn aggregate(&self, listings: &[NormalizedListingRecord]) -> Vec<AggregatedGroup> {
        let _enter = self.span.enter();

        if listings.is_empty() {
            warn!("No listings to aggregate");
            return Vec::new();
        }
        info!("Aggregating {} listings...", listings.len());

        let complete: Vec<&NormalizedListingRecord> =
            listings.iter().filter(|l| is_aggregatable(l)).collect();
        info!("{} listings have complete essential data", complete.len());

        let kept = remove_outliers(complete);

        let mut groups: BTreeMap<GroupKey, Vec<&NormalizedListingRecord>> = BTreeMap::new();
        for l in kept {
            // `is_aggregatable` guarantees a year
            let Some(year) = l.year else { continue };
            let key = (l.city.clone(), year, l.neighborhood.clone(), l.housing_type.clone());
            groups.entry(key).or_default().push(l);
        }

        let out: Vec<AggregatedGroup> = groups
            .into_iter()
            .filter_map(|((city, year, neighborhood, housing_type), members)| {
                summarize_group(city, neighborhood, housing_type, year, &members)
            })
            .collect();

        info!(
            "Aggregated to {} unique (city, neighborhood, type, year) groups",
            out.len()
        );
        out
    }
}

fn is_aggregatable(l: &NormalizedListingRecord) -> bool {
    l.has_price
        && l.has_housing_type
        && l.has_date
        && l.monthly_rent_xaf.is_some()
        && l.year.is_some()
}

/// IQR fence per housing type. Input order is kept within the survivors.
pub fn remove_outliers(listings: Vec<&NormalizedListingRecord>) -> Vec<&NormalizedListingRecord> {
    let mut rents_by_type: HashMap<&str, Vec<f64>> = HashMap::new();
    for l in &listings {
        if let Some(rent) = l.monthly_rent_xaf {
            rents_by_type.entry(l.housing_type.as_str()).or_default().push(rent);
        }
    }

    let fences: HashMap<&str, (f64, f64)> = rents_by_type
        .iter()
        .filter(|(_, rents)| rents.len() >= MIN_OUTLIER_SAMPLE)
        .filter_map(|(ty, rents)| {
            let sorted = stats::sorted(rents);
            let q1 = stats::quantile_sorted(&sorted, 0.25)?;
            let q3 = stats::quantile_sorted(&sorted, 0.75)?;
            let iqr = q3 - q1;
            Some((*ty, (q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr)))
        })
        .collect();

    let before = listings.len();
    let mut removed_by_type: BTreeMap<&str, usize> = BTreeMap::new();
    let kept: Vec<_> = listings
        .into_iter()
        .filter(|l| {
            let fence = fences.get(l.housing_type.as_str());
            let (Some(rent), Some((lo, hi))) = (l.monthly_rent_xaf, fence) else {
                return true;
            };
            let inside = rent >= *lo && rent <= *hi;
            if !inside {
                *removed_by_type.entry(l.housing_type.as_str()).or_default() += 1;
            }
            inside
        })
        .collect();

    for (ty, n) in &removed_by_type {
        info!("Removed {} outliers from {}", n, ty);
    }
    debug!("Outlier filter kept {} / {}", kept.len(), before);
    kept
}

fn summarize_group(
    city: String,
    neighborhood: String,
    housing_type: String,
    year: i32,
    members: &[&NormalizedListingRecord],
) -> Option<AggregatedGroup> {
    let rents: Vec<f64> = members.iter().filter_map(|l| l.monthly_rent_xaf).collect();
    let per_sqm: Vec<f64> = members.iter().filter_map(|l| l.rent_per_sqm).collect();

    let sorted = stats::sorted(&rents);
    let median = stats::quantile_sorted(&sorted, 0.5)?;
    let p25 = stats::quantile_sorted(&sorted, 0.25)?;
    let p75 = stats::quantile_sorted(&sorted, 0.75)?;
    let volatility = stats::coefficient_of_variation(&rents);
    let listing_count = members.len();

    Some(AggregatedGroup {
        city,
        neighborhood,
        housing_type,
        year,
        median_monthly_rent_xaf: median,
        p25_monthly_rent_xaf: p25,
        p75_monthly_rent_xaf: p75,
        median_rent_per_sqm: stats::median(&per_sqm),
        rent_volatility_score: volatility,
        listing_count,
        data_confidence: ConfidenceTier::from_stats(listing_count, volatility),
    })
}
