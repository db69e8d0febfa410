//! Listing dates → (year, month).
//!
//! Strategies run in order, strict ones first:
//!   1. ISO-like `2024-01` / `2024/1`
//!   2. month name + year, French then English ("15 janvier 2024", "March 2025")
//!   3. relative ("il y a 2 mois", "3 weeks ago")
//!   4. best-effort format sweep ("12/03/2024", "Mar 5, 2025")
//!   5. optional fallback to the current month

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::trace;

/// Inclusive year window accepted by the strict strategies.
pub const MIN_YEAR: i32 = 2021;
pub const MAX_YEAR: i32 = 2026;

pub fn is_valid_year_month(year: i32, month: u32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year) && (1..=12).contains(&month)
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Source of "today" for relative dates and the current-month fallback.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Pinned date, for reproducible runs and tests.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

// ── Patterns ──────────────────────────────────────────────────────────────────

static RE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-/](\d{1,2})").expect("iso regex"));

static RE_REL_DAYS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:il y a|ago)\s*(\d+)\s*(?:jour|day)s?|(\d+)\s*(?:jour|day)s?\s+ago)")
        .expect("relative days regex")
});
static RE_REL_WEEKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:il y a|ago)\s*(\d+)\s*(?:semaine|week)s?|(\d+)\s*(?:semaine|week)s?\s+ago)")
        .expect("relative weeks regex")
});
static RE_REL_MONTHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:il y a|ago)\s*(\d+)\s*(?:mois|month)s?|(\d+)\s*(?:mois|months?)\s+ago)")
        .expect("relative months regex")
});

const MONTH_NAMES_FR: &[(&str, u32)] = &[
    ("janvier", 1),
    ("février", 2),
    ("fevrier", 2),
    ("mars", 3),
    ("avril", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("août", 8),
    ("aout", 8),
    ("septembre", 9),
    ("octobre", 10),
    ("novembre", 11),
    ("décembre", 12),
    ("decembre", 12),
];

const MONTH_NAMES_EN: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

/// One regex per month name: `<name>\s+(\d{4})`, French list first.
static MONTH_NAME_RULES: LazyLock<Vec<(Regex, u32)>> = LazyLock::new(|| {
    MONTH_NAMES_FR
        .iter()
        .chain(MONTH_NAMES_EN)
        .map(|(name, month)| {
            let re = Regex::new(&format!(r"{}\s+(\d{{4}})", regex::escape(name)))
                .expect("month name regex");
            (re, *month)
        })
        .collect()
});

/// Formats tried by the best-effort sweep.
const LOOSE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d %Y",
    "%B %d %Y",
];

// ── Extractor ─────────────────────────────────────────────────────────────────

type Strategy = fn(&DateExtractor, &str) -> Option<(i32, u32)>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("iso", DateExtractor::from_iso),
    ("month_name", DateExtractor::from_month_name),
    ("relative", DateExtractor::from_relative),
    ("loose", DateExtractor::from_loose_formats),
];

pub struct DateExtractor {
    clock: Arc<dyn Clock>,
}

impl DateExtractor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Returns `(year, month)`, both `Some` or both `None`.
    pub fn extract(&self, text: &str, fallback_current: bool) -> (Option<i32>, Option<u32>) {
        let text = text.trim();
        if !text.is_empty() {
            let lower = text.to_lowercase();
            for (name, strategy) in STRATEGIES {
                if let Some((y, m)) = strategy(self, &lower) {
                    trace!(strategy = *name, year = y, month = m, "date resolved");
                    return (Some(y), Some(m));
                }
            }
        }

        if fallback_current {
            let (y, m) = self.current();
            (Some(y), Some(m))
        } else {
            (None, None)
        }
    }

    fn current(&self) -> (i32, u32) {
        let today = self.clock.today();
        (today.year(), today.month())
    }

    fn from_iso(&self, text: &str) -> Option<(i32, u32)> {
        let caps = RE_ISO.captures(text)?;
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        is_valid_year_month(year, month).then_some((year, month))
    }

    fn from_month_name(&self, text: &str) -> Option<(i32, u32)> {
        MONTH_NAME_RULES.iter().find_map(|(re, month)| {
            let year: i32 = re.captures(text)?[1].parse().ok()?;
            is_valid_year_month(year, *month).then_some((year, *month))
        })
    }

    /// No window check here: "il y a 60 mois" may land before `MIN_YEAR`.
    fn from_relative(&self, text: &str) -> Option<(i32, u32)> {
        if let Some(days) = relative_count(&RE_REL_DAYS, text) {
            if days < 30 {
                return Some(self.current());
            }
        }

        if let Some(weeks) = relative_count(&RE_REL_WEEKS, text) {
            if weeks < 8 {
                return Some(self.current());
            }
        }

        let months = relative_count(&RE_REL_MONTHS, text)?;
        let (year, month) = self.current();
        // months since year 0, so rollover is a Euclidean split
        let total = i64::from(year) * 12 + i64::from(month) - 1 - months;
        let year = i32::try_from(total.div_euclid(12)).ok()?;
        let month = u32::try_from(total.rem_euclid(12) + 1).ok()?;
        Some((year, month))
    }

    fn from_loose_formats(&self, text: &str) -> Option<(i32, u32)> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let whole = std::iter::once(tokens.join(" "));
        let windows = (1..=tokens.len().min(4))
            .rev()
            .flat_map(|w| tokens.windows(w).map(|t| t.join(" ")).collect::<Vec<_>>());

        whole
            .chain(windows)
            .filter_map(|candidate| parse_loose(&candidate))
            .map(|d| (d.year(), d.month()))
            .find(|(y, m)| is_valid_year_month(*y, *m))
    }
}

fn relative_count(re: &Regex, text: &str) -> Option<i64> {
    let caps = re.captures(text)?;
    let n = caps.get(1).or_else(|| caps.get(2))?;
    n.as_str().parse().ok()
}

fn parse_loose(candidate: &str) -> Option<NaiveDate> {
    let candidate = candidate.trim_matches(|c: char| !c.is_alphanumeric());
    LOOSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
}
