//! Free-text rent prices → monthly XAF.
//!
//! "150k FCFA/mois" → 150,000 XAF monthly | "1.2M XAF/an" → 100,000 XAF monthly

use crate::models::{Currency, Frequency};
use regex::Regex;
use std::sync::LazyLock;

// ── Magnitude rules (first match wins) ────────────────────────────────────────

static RE_MEGA: LazyLock<Regex> = LazyLock::new(|| {
    // An `M` directly followed by `O` is "MOIS", not a suffix.
    Regex::new(r"(\d+(?:\.\d+)?)(?:MILLIONS?|MIL|M)(?:[^O]|$)").expect("mega regex")
});
static RE_KILO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)K").expect("kilo regex"));
static RE_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("bare number regex"));

struct MagnitudeRule {
    regex: &'static LazyLock<Regex>,
    multiplier: f64,
}

const MAGNITUDE_RULES: &[MagnitudeRule] = &[
    MagnitudeRule { regex: &RE_MEGA, multiplier: 1_000_000.0 },
    MagnitudeRule { regex: &RE_KILO, multiplier: 1_000.0 },
    MagnitudeRule { regex: &RE_BARE, multiplier: 1.0 },
];

// ── Currency / frequency rules ────────────────────────────────────────────────

static RE_XAF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"XAF|FCFA|CFA|F\s*CFA").expect("xaf regex"));
static RE_EUR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"EUR|€").expect("eur regex"));
static RE_USD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"USD|\$").expect("usd regex"));

const CURRENCY_RULES: &[(Currency, &LazyLock<Regex>)] = &[
    (Currency::Xaf, &RE_XAF),
    (Currency::Eur, &RE_EUR),
    (Currency::Usd, &RE_USD),
];

static RE_MONTHLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)mois|month|mensuel").expect("monthly regex"));
static RE_YEARLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bans?\b|year|annuel|ann[ée]e").expect("yearly regex")
});
static RE_DAILY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)jour|day|journalier").expect("daily regex"));

const FREQUENCY_RULES: &[(Frequency, &LazyLock<Regex>)] = &[
    (Frequency::Monthly, &RE_MONTHLY),
    (Frequency::Yearly, &RE_YEARLY),
    (Frequency::Daily, &RE_DAILY),
];

// ── Parser ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedPrice {
    pub monthly_xaf: Option<f64>,
    pub currency: Currency,
    pub frequency: Frequency,
}

impl ParsedPrice {
    fn unknown() -> Self {
        Self {
            monthly_xaf: None,
            currency: Currency::Unknown,
            frequency: Frequency::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceParser;

impl PriceParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, price_text: &str) -> ParsedPrice {
        self.parse_with_hints(price_text, "", "")
    }

    /// Like [`parse`](Self::parse), but the separate currency / frequency
    /// columns some sources expose are consulted when the price text itself
    /// carries no marker.
    pub fn parse_with_hints(
        &self,
        price_text: &str,
        currency_hint: &str,
        frequency_hint: &str,
    ) -> ParsedPrice {
        let text = price_text.trim().to_uppercase();
        if text.is_empty() {
            return ParsedPrice::unknown();
        }

        let Some(amount) = extract_amount(&text) else {
            return ParsedPrice::unknown();
        };

        let currency = detect_currency(&text)
            .or_else(|| detect_currency(&currency_hint.trim().to_uppercase()))
            .unwrap_or(Currency::Xaf);
        let frequency = detect_frequency(&text)
            .or_else(|| detect_frequency(frequency_hint))
            .unwrap_or(Frequency::Monthly);

        let monthly = frequency.to_monthly(amount * currency.to_xaf_rate());
        if !monthly.is_finite() || monthly <= 0.0 {
            return ParsedPrice::unknown();
        }

        ParsedPrice {
            monthly_xaf: Some(monthly),
            currency,
            frequency,
        }
    }
}

/// Numeric magnitude with suffix multiplier applied.
/// Thousands separators and all whitespace are removed first.
pub fn extract_amount(text: &str) -> Option<f64> {
    let compact: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    MAGNITUDE_RULES.iter().find_map(|rule| {
        let caps = rule.regex.captures(&compact)?;
        let n: f64 = caps.get(1)?.as_str().parse().ok()?;
        Some(n * rule.multiplier)
    })
}

fn detect_currency(text: &str) -> Option<Currency> {
    CURRENCY_RULES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(c, _)| *c)
}

fn detect_frequency(text: &str) -> Option<Frequency> {
    FREQUENCY_RULES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(f, _)| *f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> ParsedPrice {
        PriceParser::new().parse(s)
    }

    #[test]
    fn test_kilo_suffix_monthly() {
        let p = parse("150k FCFA/mois");
        assert_eq!(p.monthly_xaf, Some(150_000.0));
        assert_eq!(p.currency, Currency::Xaf);
        assert_eq!(p.frequency, Frequency::Monthly);
    }

    #[test]
    fn test_mega_suffix_yearly() {
        let p = parse("1.2M XAF/an");
        assert_eq!(p.monthly_xaf, Some(100_000.0));
        assert_eq!(p.currency, Currency::Xaf);
        assert_eq!(p.frequency, Frequency::Yearly);
    }

    #[test]
    fn test_empty_and_garbage() {
        assert_eq!(parse(""), ParsedPrice::unknown());
        assert_eq!(parse("   "), ParsedPrice::unknown());
        assert_eq!(parse("Prix sur demande"), ParsedPrice::unknown());
        assert_eq!(parse("0 FCFA"), ParsedPrice::unknown());
    }

    #[test]
    fn test_thousands_separators_and_nbsp() {
        assert_eq!(parse("150,000 FCFA").monthly_xaf, Some(150_000.0));
        assert_eq!(parse("200 000 FCFA par mois").monthly_xaf, Some(200_000.0));
        assert_eq!(parse("75\u{a0}000 XAF").monthly_xaf, Some(75_000.0));
    }

    #[test]
    fn test_mois_is_not_a_mega_suffix() {
        let p = parse("50000 mois");
        assert_eq!(p.monthly_xaf, Some(50_000.0));
        assert_eq!(p.frequency, Frequency::Monthly);
    }

    #[test]
    fn test_foreign_currency_conversion() {
        let eur = parse("500 € / month");
        assert_eq!(eur.currency, Currency::Eur);
        assert!((eur.monthly_xaf.unwrap() - 327_978.5).abs() < 1e-6);

        let usd = parse("$300");
        assert_eq!(usd.currency, Currency::Usd);
        assert_eq!(usd.monthly_xaf, Some(180_000.0));
    }

    #[test]
    fn test_daily_and_defaults() {
        let p = parse("10000 FCFA par jour");
        assert_eq!(p.frequency, Frequency::Daily);
        assert_eq!(p.monthly_xaf, Some(300_000.0));

        let d = parse("80000");
        assert_eq!(d.currency, Currency::Xaf);
        assert_eq!(d.frequency, Frequency::Monthly);
    }

    #[test]
    fn test_francs_is_not_yearly() {
        assert_eq!(parse("90000 francs").frequency, Frequency::Monthly);
    }

    #[test]
    fn test_hints_only_fill_gaps() {
        let parser = PriceParser::new();
        let p = parser.parse_with_hints("1200000", "EUR", "par an");
        assert_eq!(p.currency, Currency::Eur);
        assert_eq!(p.frequency, Frequency::Yearly);

        let explicit = parser.parse_with_hints("100k FCFA/mois", "EUR", "par an");
        assert_eq!(explicit.currency, Currency::Xaf);
        assert_eq!(explicit.frequency, Frequency::Monthly);
        assert_eq!(explicit.monthly_xaf, Some(100_000.0));
    }
}
