//! Approximate duplicate removal across sources and re-scrapes.
//!
//! Two listings are duplicates when city, neighborhood, housing type, rent
//! rounded to the nearest 1,000 XAF and source site all agree. Distinct
//! listings can collide on that key; the later one is dropped.

use crate::models::NormalizedListingRecord;
use std::collections::HashSet;
use tracing::{Span, info};

const PRICE_BUCKET_XAF: f64 = 1_000.0;

pub struct Deduplicator {
    span: Span,
}

impl Deduplicator {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Keep the first record per signature, in input order.
    pub fn deduplicate(
        &self,
        listings: Vec<NormalizedListingRecord>,
    ) -> Vec<NormalizedListingRecord> {
        let total = listings.len();
        let mut seen = HashSet::with_capacity(total);

        let unique: Vec<_> = listings
            .into_iter()
            .filter(|l| seen.insert(signature(l)))
            .collect();

        let _enter = self.span.enter();
        info!(
            "Removed {} duplicates. {} unique listings remain.",
            total - unique.len(),
            unique.len()
        );
        unique
    }
}

/// `city|neighborhood|housing_type|rounded_price|source_site`
pub fn signature(l: &NormalizedListingRecord) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        l.city.to_lowercase(),
        l.neighborhood.to_lowercase(),
        l.housing_type,
        rounded_price(l.monthly_rent_xaf),
        l.source_site,
    )
}

/// Nearest 1,000 with ties to even; 0 when there is no price.
fn rounded_price(rent: Option<f64>) -> i64 {
    match rent {
        Some(r) => ((r / PRICE_BUCKET_XAF).round_ties_even() * PRICE_BUCKET_XAF) as i64,
        _ => 0,
    }
}
