//! Raw listing → normalized listing.
//!
//! Field-level parse failures become `None`; a record that comes out
//! internally inconsistent is dropped as a whole with a warning.

pub mod dates;
pub mod housing;
pub mod neighborhood;
pub mod price;

use crate::models::{NormalizedListingRecord, RawListingRecord};
use crate::taxonomy::Taxonomy;
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{Span, debug, error, warn};

use self::dates::{Clock, DateExtractor};
use self::housing::classify_housing_type;
use self::neighborhood::resolve_neighborhood;
use self::price::PriceParser;

static RE_INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("int regex"));
static RE_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("decimal regex"));

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("non-finite {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("year and month must be resolved together (year={year:?}, month={month:?})")]
    PartialDate { year: Option<i32>, month: Option<u32> },

    #[error("rent_per_sqm {rent_per_sqm:?} inconsistent with rent {rent:?} / size {size:?}")]
    RentPerSqm {
        rent: Option<f64>,
        size: Option<f64>,
        rent_per_sqm: Option<f64>,
    },
}

// ── Field parsers ─────────────────────────────────────────────────────────────

/// First integer in the text. "3 chambres" → 3 | "studio" → None
pub fn parse_bedrooms(s: &str) -> Option<u32> {
    RE_INT.find(s)?.as_str().parse().ok()
}

/// First decimal number, kept only if positive. "85.5 m²" → 85.5
pub fn parse_size(s: &str) -> Option<f64> {
    let n: f64 = RE_DECIMAL.find(s)?.as_str().parse().ok()?;
    (n.is_finite() && n > 0.0).then_some(n)
}

// ── Normalizer ────────────────────────────────────────────────────────────────

pub struct Normalizer {
    taxonomy: Arc<Taxonomy>,
    prices: PriceParser,
    dates: DateExtractor,
    date_fallback_current: bool,
    span: Span,
}

impl Normalizer {
    pub fn new(taxonomy: Arc<Taxonomy>, clock: Arc<dyn Clock>, span: Span) -> Self {
        Self {
            taxonomy,
            prices: PriceParser::new(),
            dates: DateExtractor::new(clock),
            date_fallback_current: true,
            span,
        }
    }

    /// Whether an unresolvable listing date defaults to the current month.
    pub fn with_date_fallback(mut self, fallback_current: bool) -> Self {
        self.date_fallback_current = fallback_current;
        self
    }

    pub fn try_normalize(
        &self,
        raw: &RawListingRecord,
    ) -> Result<NormalizedListingRecord, NormalizeError> {
        let price = self.prices.parse_with_hints(
            &raw.rent_price_raw,
            &raw.currency_raw,
            &raw.payment_frequency_raw,
        );
        let (year, month) = self
            .dates
            .extract(&raw.listing_date, self.date_fallback_current);

        let housing_type = classify_housing_type(
            &self.taxonomy.housing_types,
            &raw.housing_type_raw,
            &raw.full_description,
            &raw.bedrooms_raw,
        );

        let city = raw.city.trim().to_lowercase();
        let neighborhood = resolve_neighborhood(&self.taxonomy, &raw.neighborhood, &city);

        let monthly_rent_xaf = price.monthly_xaf;
        let size_sqm = parse_size(&raw.size_raw);
        let rent_per_sqm = match (monthly_rent_xaf, size_sqm) {
            (Some(rent), Some(size)) => Some(rent / size),
            _ => None,
        };

        let record = NormalizedListingRecord {
            has_price: monthly_rent_xaf.is_some(),
            has_size: size_sqm.is_some(),
            has_neighborhood: !neighborhood.is_empty(),
            has_housing_type: !housing_type.is_empty(),
            has_date: year.is_some(),

            city,
            neighborhood,
            housing_type,
            bedrooms: parse_bedrooms(&raw.bedrooms_raw),
            size_sqm,
            monthly_rent_xaf,
            rent_per_sqm,
            year,
            month,
            source_site: raw.source_site.clone(),
            listing_url: raw.listing_url.clone(),
        };

        check_consistency(&record)?;
        Ok(record)
    }

    /// `None` when the record had to be dropped. A panic while normalizing
    /// one record drops that record only.
    pub fn normalize(&self, raw: &RawListingRecord) -> Option<NormalizedListingRecord> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_normalize(raw)));

        let _enter = self.span.enter();
        match outcome {
            Ok(Ok(record)) => Some(record),
            Ok(Err(e)) => {
                warn!("Dropping listing {:?} from {:?}: {}", raw.listing_url, raw.source_site, e);
                None
            }
            Err(_) => {
                error!(
                    "Panic while normalizing listing {:?} from {:?}; dropped",
                    raw.listing_url, raw.source_site
                );
                None
            }
        }
    }

    /// Normalize a batch, keeping input order and skipping dropped records.
    pub fn normalize_all(&self, raws: &[RawListingRecord]) -> Vec<NormalizedListingRecord> {
        let out: Vec<_> = raws.iter().filter_map(|r| self.normalize(r)).collect();

        let _enter = self.span.enter();
        debug!("Normalized {} / {} listings", out.len(), raws.len());
        out
    }
}

fn check_consistency(r: &NormalizedListingRecord) -> Result<(), NormalizeError> {
    for (field, value) in [
        ("monthly_rent_xaf", r.monthly_rent_xaf),
        ("size_sqm", r.size_sqm),
        ("rent_per_sqm", r.rent_per_sqm),
    ] {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(NormalizeError::NonFinite { field, value: v });
            }
        }
    }

    if r.year.is_some() != r.month.is_some() {
        return Err(NormalizeError::PartialDate {
            year: r.year,
            month: r.month,
        });
    }

    let paired = r.monthly_rent_xaf.is_some() && r.size_sqm.is_some();
    if paired != r.rent_per_sqm.is_some() {
        return Err(NormalizeError::RentPerSqm {
            rent: r.monthly_rent_xaf,
            size: r.size_sqm,
            rent_per_sqm: r.rent_per_sqm,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::dates::FixedClock;
    use chrono::NaiveDate;

    fn normalizer() -> Normalizer {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        Normalizer::new(
            Arc::new(Taxonomy::defaults()),
            Arc::new(FixedClock(today)),
            Span::none(),
        )
    }

    fn raw() -> RawListingRecord {
        RawListingRecord {
            city: " Douala ".into(),
            neighborhood: "Bonapriso, rue Njo-Njo".into(),
            housing_type_raw: "Appartement 2 chambres".into(),
            full_description: "Bel appartement meublé".into(),
            rent_price_raw: "250k FCFA/mois".into(),
            bedrooms_raw: "2".into(),
            size_raw: "100 m²".into(),
            listing_date: "15 janvier 2024".into(),
            source_site: "Coin Afrique".into(),
            listing_url: "https://example.test/annonce/1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_record() {
        let n = normalizer().normalize(&raw()).unwrap();
        assert_eq!(n.city, "douala");
        assert_eq!(n.neighborhood, "Bonapriso");
        assert_eq!(n.housing_type, "two_bedroom");
        assert_eq!(n.bedrooms, Some(2));
        assert_eq!(n.size_sqm, Some(100.0));
        assert_eq!(n.monthly_rent_xaf, Some(250_000.0));
        assert_eq!(n.rent_per_sqm, Some(2_500.0));
        assert_eq!((n.year, n.month), (Some(2024), Some(1)));
        assert!(n.has_price && n.has_size && n.has_neighborhood);
        assert!(n.has_housing_type && n.has_date);
        assert_eq!(n.source_site, "Coin Afrique");
    }

    #[test]
    fn test_rent_per_sqm_requires_both() {
        let norm = normalizer();

        let mut no_size = raw();
        no_size.size_raw = "n/a".into();
        let n = norm.normalize(&no_size).unwrap();
        assert!(n.has_price && !n.has_size);
        assert_eq!(n.rent_per_sqm, None);

        let mut no_price = raw();
        no_price.rent_price_raw = "Prix sur demande".into();
        let n = norm.normalize(&no_price).unwrap();
        assert!(!n.has_price && n.has_size);
        assert_eq!(n.rent_per_sqm, None);

        let mut zero_size = raw();
        zero_size.size_raw = "0 m²".into();
        let n = norm.normalize(&zero_size).unwrap();
        assert_eq!(n.size_sqm, None);
        assert_eq!(n.rent_per_sqm, None);
    }

    #[test]
    fn test_sparse_record_flags() {
        let norm = normalizer().with_date_fallback(false);
        let n = norm
            .normalize(&RawListingRecord {
                city: "Kribi".into(),
                neighborhood: "Plage".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(n.city, "kribi");
        assert_eq!(n.neighborhood, "");
        assert_eq!(n.housing_type, "unknown");
        assert!(!n.has_price && !n.has_size && !n.has_neighborhood && !n.has_date);
        assert!(n.has_housing_type);
        assert_eq!((n.year, n.month), (None, None));
    }

    #[test]
    fn test_date_fallback_uses_clock() {
        let n = normalizer()
            .normalize(&RawListingRecord::default())
            .unwrap();
        assert_eq!((n.year, n.month), (Some(2025), Some(6)));
    }

    #[test]
    fn test_overflowing_size_is_dropped_softly() {
        let mut r = raw();
        r.size_raw = "9".repeat(400);
        let n = normalizer().normalize(&r).unwrap();
        assert_eq!(n.size_sqm, None);
    }

    #[test]
    fn test_inconsistent_record_is_rejected() {
        let mut r = normalizer().normalize(&raw()).unwrap();
        r.month = None;
        assert!(matches!(
            check_consistency(&r),
            Err(NormalizeError::PartialDate { .. })
        ));

        let mut r = normalizer().normalize(&raw()).unwrap();
        r.rent_per_sqm = Some(f64::INFINITY);
        assert!(matches!(
            check_consistency(&r),
            Err(NormalizeError::NonFinite { field: "rent_per_sqm", .. })
        ));
    }

    #[test]
    fn test_batch_keeps_order() {
        let norm = normalizer();
        let mut a = raw();
        a.listing_url = "a".into();
        let mut b = raw();
        b.listing_url = "b".into();
        let mut c = raw();
        c.listing_url = "c".into();

        let out = norm.normalize_all(&[a, b, c]);
        let urls: Vec<&str> = out.iter().map(|n| n.listing_url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b", "c"]);
    }

    struct BrokenClock;

    impl Clock for BrokenClock {
        fn today(&self) -> NaiveDate {
            panic!("clock unavailable");
        }
    }

    #[test]
    fn test_panic_drops_only_that_record() {
        let norm = Normalizer::new(
            Arc::new(Taxonomy::defaults()),
            Arc::new(BrokenClock),
            Span::none(),
        );

        // a resolvable date never reads the clock; a blank one falls back to it
        let dated = raw();
        let mut undated = raw();
        undated.listing_date = String::new();
        undated.listing_url = "undated".into();

        assert!(norm.normalize(&undated).is_none());
        let out = norm.normalize_all(&[undated, dated.clone(), raw()]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].listing_url, dated.listing_url);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_bedrooms("3 chambres"), Some(3));
        assert_eq!(parse_bedrooms("studio"), None);
        assert_eq!(parse_size("85.5 m²"), Some(85.5));
        assert_eq!(parse_size("surface: 120m2"), Some(120.0));
        assert_eq!(parse_size(""), None);
    }
}
