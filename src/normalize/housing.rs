use crate::taxonomy::HousingCategory;

pub const UNKNOWN_HOUSING_TYPE: &str = "unknown";

/// Bedroom-count fallback when no keyword matched: 0, 1, 2, 3+.
const BEDROOM_CATEGORIES: &[&str] = &["studio", "one_bedroom", "two_bedroom", "three_plus_bedroom"];

/// Map listing text to a housing category.
///
/// The category table is walked in declaration order and the first category
/// with a keyword contained in `raw_type + description` wins. Without a
/// keyword hit the raw bedroom count decides; otherwise `unknown`.
pub fn classify_housing_type(
    categories: &[HousingCategory],
    raw_type: &str,
    description: &str,
    bedrooms_raw: &str,
) -> String {
    let text = format!("{} {}", raw_type, description).to_lowercase();

    let by_keyword = categories.iter().find(|cat| {
        cat.keywords
            .iter()
            .any(|kw| !kw.is_empty() && text.contains(kw.as_str()))
    });
    if let Some(cat) = by_keyword {
        return cat.name.clone();
    }

    bedroom_category(bedrooms_raw)
        .unwrap_or(UNKNOWN_HOUSING_TYPE)
        .to_string()
}

/// Whole-string integer only: "2" → two_bedroom, "2 chambres" → None.
fn bedroom_category(bedrooms_raw: &str) -> Option<&'static str> {
    let count: u32 = bedrooms_raw.trim().parse().ok()?;
    let idx = (count as usize).min(BEDROOM_CATEGORIES.len() - 1);
    Some(BEDROOM_CATEGORIES[idx])
}
