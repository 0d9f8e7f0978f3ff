use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-component quality points. `total` is capped at 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub discount: u8,
    pub price: u8,
    pub reputation: u8,
    pub freshness: u8,
    pub stock: u8,
    pub total: u8,
}

/// Inputs the score depends on; everything else about a listing is ignored.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub discount_percentage: u8,
    /// Value basis for the price tier: original price when known, else sale price.
    pub value_price: f64,
    pub retailer_name: &'a str,
    pub found_at: DateTime<Utc>,
    pub in_stock: bool,
    pub limited_stock: bool,
}

/// Retailer score used when no reputation entry matches.
pub const DEFAULT_REPUTATION: u8 = 10;

pub fn score(input: &ScoreInput<'_>, reputation: &[(String, u8)], now: DateTime<Utc>) -> ScoreBreakdown {
    let discount = discount_points(input.discount_percentage);
    let price = price_points(input.value_price);
    let reputation = reputation_points(input.retailer_name, reputation);
    let freshness = freshness_points(input.found_at, now);
    let stock = stock_points(input.in_stock, input.limited_stock);

    let sum = u16::from(discount)
        + u16::from(price)
        + u16::from(reputation)
        + u16::from(freshness)
        + u16::from(stock);

    ScoreBreakdown {
        discount,
        price,
        reputation,
        freshness,
        stock,
        total: sum.min(100) as u8,
    }
}

/// Max 40.
pub fn discount_points(pct: u8) -> u8 {
    match pct {
        70.. => 40,
        50..=69 => 35,
        40..=49 => 30,
        30..=39 => 25,
        20..=29 => 20,
        _ => 0,
    }
}

/// Max 20.
pub fn price_points(price: f64) -> u8 {
    if price >= 500.0 {
        20
    } else if price >= 200.0 {
        15
    } else if price >= 100.0 {
        10
    } else if price >= 50.0 {
        5
    } else {
        0
    }
}

/// Max 20. First table entry whose key is a case-insensitive substring of
/// the retailer name wins.
pub fn reputation_points(retailer: &str, table: &[(String, u8)]) -> u8 {
    let name = retailer.to_lowercase();
    table
        .iter()
        .find(|(key, _)| name.contains(key.as_str()))
        .map(|(_, points)| (*points).clamp(DEFAULT_REPUTATION, 20))
        .unwrap_or(DEFAULT_REPUTATION)
}

/// Max 10. A `found_at` in the future counts as just found.
pub fn freshness_points(found_at: DateTime<Utc>, now: DateTime<Utc>) -> u8 {
    let hours = (now - found_at).num_seconds().max(0) as f64 / 3_600.0;
    if hours < 6.0 {
        10
    } else if hours < 24.0 {
        8
    } else if hours < 72.0 {
        5
    } else {
        0
    }
}

/// Max 10.
pub fn stock_points(in_stock: bool, limited_stock: bool) -> u8 {
    if in_stock {
        10
    } else if limited_stock {
        5
    } else {
        0
    }
}
