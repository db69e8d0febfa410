use serde::{Deserialize, Serialize};
use std::fmt;

// ── Raw listing (scraper output) ──────────────────────────────────────────────

/// One listing as emitted by the scraping collaborator. Every field is raw
/// page text; missing columns deserialize to empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawListingRecord {
    pub city: String,
    pub neighborhood: String,
    pub housing_type_raw: String,
    pub full_description: String,
    pub rent_price_raw: String,
    pub payment_frequency_raw: String,
    pub currency_raw: String,
    pub bedrooms_raw: String,
    pub size_raw: String,
    pub listing_date: String,
    pub source_site: String,
    pub listing_url: String,
}

// ── Normalized listing ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedListingRecord {
    pub city: String,
    pub neighborhood: String,
    pub housing_type: String,
    pub bedrooms: Option<u32>,
    pub size_sqm: Option<f64>,

    pub monthly_rent_xaf: Option<f64>,
    pub rent_per_sqm: Option<f64>,

    pub year: Option<i32>,
    pub month: Option<u32>,

    pub source_site: String,
    pub listing_url: String,

    pub has_price: bool,
    pub has_size: bool,
    pub has_neighborhood: bool,
    pub has_housing_type: bool,
    pub has_date: bool,
}

// ── Aggregated market row ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedGroup {
    pub city: String,
    pub neighborhood: String,
    pub housing_type: String,
    pub year: i32,
    pub median_monthly_rent_xaf: f64,
    pub p25_monthly_rent_xaf: f64,
    pub p75_monthly_rent_xaf: f64,
    pub median_rent_per_sqm: Option<f64>,
    pub rent_volatility_score: f64,
    pub listing_count: usize,
    pub data_confidence: ConfidenceTier,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// Thresholds are checked high → medium → low.
    pub fn from_stats(listing_count: usize, volatility: f64) -> Self {
        if listing_count >= 10 && volatility < 0.3 {
            ConfidenceTier::High
        } else if listing_count >= 5 && volatility < 0.5 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ── Price vocabulary ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Xaf,
    Eur,
    Usd,
    Unknown,
}

impl Currency {
    /// Fixed multiplier into the reference currency (XAF).
    pub fn to_xaf_rate(&self) -> f64 {
        match self {
            Currency::Xaf | Currency::Unknown => 1.0,
            Currency::Eur => 655.957,
            Currency::Usd => 600.0,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Xaf => "XAF",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Monthly,
    Yearly,
    Daily,
    Unknown,
}

impl Frequency {
    /// Scale an amount paid at this frequency to a monthly figure.
    pub fn to_monthly(&self, amount: f64) -> f64 {
        match self {
            Frequency::Monthly | Frequency::Unknown => amount,
            Frequency::Yearly => amount / 12.0,
            Frequency::Daily => amount * 30.0,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
            Frequency::Daily => "daily",
            Frequency::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_boundaries() {
        assert_eq!(ConfidenceTier::from_stats(12, 0.2), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_stats(6, 0.4), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_stats(3, 0.0), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_stats(3, 0.9), ConfidenceTier::Low);
        // count qualifies for high but volatility only for medium
        assert_eq!(ConfidenceTier::from_stats(10, 0.3), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_stats(5, 0.5), ConfidenceTier::Low);
    }

    #[test]
    fn test_raw_record_missing_fields_default_to_empty() {
        let raw: RawListingRecord =
            serde_json::from_str(r#"{"city": "Douala", "rent_price_raw": "150k"}"#).unwrap();
        assert_eq!(raw.city, "Douala");
        assert_eq!(raw.rent_price_raw, "150k");
        assert!(raw.neighborhood.is_empty());
        assert!(raw.listing_date.is_empty());
    }

    #[test]
    fn test_confidence_serializes_lowercase() {
        let json = serde_json::to_string(&ConfidenceTier::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        assert_eq!(format!("{:<6}|", ConfidenceTier::Low), "low   |");
    }
}
