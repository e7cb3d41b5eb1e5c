use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::generate_id;

/// One observed price for a product. Append-only; samples are never
/// deduplicated or overwritten, so repeated captures of the same price
/// accumulate as distinct rows. Currency is implied by the product.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PriceSample {
    pub id: String,
    pub product_id: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceSample {
    pub fn new(product_id: String, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            product_id,
            price,
            timestamp,
        }
    }
}
