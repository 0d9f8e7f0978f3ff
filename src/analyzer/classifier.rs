/// Slug assigned when no category keyword matches.
pub const OTHER: &str = "other";

/// One category and the keywords that vote for it.
#[derive(Debug, Clone)]
pub struct CategoryKeywords {
    pub slug: String,
    pub keywords: Vec<String>,
}

impl CategoryKeywords {
    fn new(slug: &str, keywords: &[&str]) -> Self {
        Self {
            slug: slug.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// The fixed category dictionary, in tie-break order.
pub fn default_categories() -> Vec<CategoryKeywords> {
    vec![
        CategoryKeywords::new(
            "tech-electronics",
            &[
                "laptop", "computer", "headphone", "earbud", "tv", "television", "monitor", "phone",
                "smartphone", "tablet", "camera", "speaker", "console", "gaming", "keyboard", "mouse",
                "charger", "smartwatch", "router", "ssd", "bluetooth", "wireless", "usb", "oled", "4k",
            ],
        ),
        CategoryKeywords::new(
            "fashion",
            &[
                "shirt", "dress", "jeans", "shoe", "sneaker", "boot", "jacket", "coat", "hoodie",
                "handbag", "wallet", "sunglasses", "jewelry", "watch", "apparel", "clothing", "sock",
            ],
        ),
        CategoryKeywords::new(
            "home-garden",
            &[
                "kitchen", "mixer", "blender", "cookware", "vacuum", "furniture", "mattress", "bedding",
                "sofa", "lamp", "garden", "patio", "grill", "air fryer", "pressure cooker", "appliance",
                "decor",
            ],
        ),
        CategoryKeywords::new(
            "health-beauty",
            &[
                "skincare", "makeup", "shampoo", "perfume", "fragrance", "toothbrush", "vitamin",
                "supplement", "serum", "moisturizer", "hair dryer", "razor",
            ],
        ),
        CategoryKeywords::new(
            "sports-outdoors",
            &[
                "fitness", "yoga", "dumbbell", "treadmill", "bike", "bicycle", "camping", "tent",
                "hiking", "running", "golf", "kayak", "sports",
            ],
        ),
        CategoryKeywords::new(
            "entertainment",
            &[
                "movie", "book", "kindle", "music", "vinyl", "concert", "streaming", "board game",
                "video game", "blu-ray", "subscription",
            ],
        ),
        CategoryKeywords::new(
            "food-dining",
            &["coffee", "snack", "restaurant", "grocery", "wine", "chocolate", "meal kit", "tea", "pizza", "food"],
        ),
        CategoryKeywords::new(
            "travel",
            &["luggage", "suitcase", "hotel", "flight", "travel", "backpack", "cruise", "vacation"],
        ),
        CategoryKeywords::new(
            "automotive",
            &["car", "tire", "automotive", "dash cam", "motor oil", "jump starter", "vehicle", "truck"],
        ),
        CategoryKeywords::new(
            "kids-family",
            &["toy", "lego", "baby", "kids", "stroller", "diaper", "crib", "puzzle", "toddler"],
        ),
        CategoryKeywords::new(
            "pets",
            &["dog", "cat", "pet", "puppy", "kitten", "litter", "aquarium"],
        ),
    ]
}

/// Pick the category whose keywords appear most often in `text`.
/// Ties go to the category declared first; no hits at all yields `other`.
pub fn categorize<'a>(text: &str, categories: &'a [CategoryKeywords]) -> &'a str {
    let text = text.to_lowercase();
    let mut best: Option<(&str, usize)> = None;

    for category in categories {
        let hits = category
            .keywords
            .iter()
            .filter(|k| contains_keyword(&text, k))
            .count();
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((category.slug.as_str(), hits));
        }
    }

    best.map(|(slug, _)| slug).unwrap_or(OTHER)
}

pub fn is_known_slug(slug: &str, categories: &[CategoryKeywords]) -> bool {
    slug == OTHER || categories.iter().any(|c| c.slug == slug)
}

/// Whole-word match, allowing a plural `s`/`es` suffix. `text` and
/// `keyword` must already be lowercase.
fn contains_keyword(text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    let bytes = text.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric();

    let mut from = 0;
    while let Some(pos) = text[from..].find(keyword) {
        let start = from + pos;
        let mut end = start + keyword.len();
        let left_ok = start == 0 || !is_word(bytes[start - 1]);

        if text[end..].starts_with("es") && (end + 2 == bytes.len() || !is_word(bytes[end + 2])) {
            end += 2;
        } else if text[end..].starts_with('s') {
            end += 1;
        }
        let right_ok = end == bytes.len() || !is_word(bytes[end]);

        if left_ok && right_ok {
            return true;
        }
        from = start + keyword.len();
    }
    false
}
