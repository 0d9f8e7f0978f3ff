//! Database row types matching `migrations/0001_init.sql`.
//! Used by sqlx for typed queries.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Category about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

impl NewCategory {
    /// Display name title-cased from the slug: `tech-electronics` → `Tech Electronics`.
    pub fn from_slug(slug: &str) -> Self {
        let name = slug
            .split(['-', '_'])
            .filter(|w| !w.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            description: Some(format!("{name} deals")),
            name,
            slug: slug.to_string(),
        }
    }
}

/// A persisted deal joined with its category slug.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DealRow {
    pub id: i64,
    pub category_id: i64,
    pub category_slug: String,
    pub name: String,
    pub description: Option<String>,
    pub sale_price: f64,
    pub original_price: Option<f64>,
    pub discount_percentage: i64,
    pub image_url: Option<String>,
    pub deal_url: String,
    pub retailer_name: String,
    pub in_stock: bool,
    pub limited_stock: bool,
    pub quality_score: i64,
    pub quality_level: String,
    pub click_count: i64,
    pub is_active: bool,
    pub found_at: DateTime<Utc>,
    pub analyzed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct CategoryCount {
    pub slug: String,
    pub name: String,
    pub deal_count: i64,
}

#[derive(Debug, Clone, Default, sqlx::FromRow, Serialize)]
pub struct DiscountSummary {
    pub total_active: i64,
    pub average_discount: Option<f64>,
    pub max_discount: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_name_from_slug() {
        let c = NewCategory::from_slug("tech-electronics");
        assert_eq!(c.name, "Tech Electronics");
        assert_eq!(c.slug, "tech-electronics");
        assert_eq!(c.description.as_deref(), Some("Tech Electronics deals"));
        assert_eq!(NewCategory::from_slug("other").name, "Other");
    }
}
