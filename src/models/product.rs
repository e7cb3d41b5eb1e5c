use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::generate_id;
use crate::rules::ExtractionRule;

/// A tracked product. Immutable after registration; there is no update path.
/// The extraction rule is bound 1:1 at registration time and stored
/// atomically with the product row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub url: String,
    pub store: String,
    pub country: String,
    pub currency: String,
    pub rule: ExtractionRule,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub brand: String,
    pub url: String,
    pub store: String,
    pub country: String,
    pub currency: String,
    pub rule: ExtractionRule,
}

impl Product {
    pub fn new(new_product: NewProduct) -> Self {
        Self {
            id: generate_id(),
            name: new_product.name,
            brand: new_product.brand,
            url: new_product.url,
            store: new_product.store,
            country: new_product.country,
            currency: new_product.currency,
            rule: new_product.rule,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_product() -> NewProduct {
        NewProduct {
            name: "Nutella".to_string(),
            brand: "Ferrero".to_string(),
            url: "https://shop.example.pl/nutella.p-967549".to_string(),
            store: "Auchan".to_string(),
            country: "Poland".to_string(),
            currency: "PLN".to_string(),
            rule: ExtractionRule::css_text("#productDetails .price").unwrap(),
        }
    }

    #[test]
    fn test_product_creation() {
        let product = Product::new(create_test_product());

        assert_eq!(product.name, "Nutella");
        assert_eq!(product.brand, "Ferrero");
        assert_eq!(product.currency, "PLN");
        assert_eq!(product.id.len(), 32);
    }

    #[test]
    fn test_serialization() {
        let product = Product::new(create_test_product());

        let serialized = serde_json::to_string(&product).unwrap();
        let deserialized: Product = serde_json::from_str(&serialized).unwrap();

        assert_eq!(product, deserialized);
    }
}
