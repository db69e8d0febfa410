use crate::taxonomy::Taxonomy;
use regex::Regex;
use std::sync::LazyLock;

const MAX_FREEFORM_LEN: usize = 50;

static RE_DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("neighborhood charset regex"));
static RE_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Canonical neighborhood for `raw` in `city`, or a cleaned freeform name.
///
/// Empty when the city has no table or `raw` is blank. A canonical entry
/// matches when one of its variants contains, or is contained in, the
/// lowercased raw text; table order decides ties.
pub fn resolve_neighborhood(taxonomy: &Taxonomy, raw: &str, city: &str) -> String {
    let raw_lower = raw.trim().to_lowercase();
    if raw_lower.is_empty() {
        return String::new();
    }
    let Some(table) = taxonomy.city(city) else {
        return String::new();
    };

    let canonical = table.neighborhoods.iter().find(|n| {
        n.variants.iter().any(|v| {
            !v.is_empty() && (raw_lower.contains(v.as_str()) || v.contains(raw_lower.as_str()))
        })
    });

    match canonical {
        Some(n) => n.name.clone(),
        None => clean_freeform(raw),
    }
}

/// Keep word characters, whitespace and hyphens; collapse runs of
/// whitespace; cap at 50 characters.
pub fn clean_freeform(raw: &str) -> String {
    let stripped = RE_DISALLOWED.replace_all(raw, "");
    let collapsed = RE_SPACES.replace_all(&stripped, " ");
    collapsed.trim().chars().take(MAX_FREEFORM_LEN).collect()
}
