use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::models::{NewProduct, PriceSample, Product};
use crate::utils::error::{EngineError, Result};

/// Record-oriented catalog and price-history storage. Products are
/// immutable after registration; price samples are append-only.
pub struct Store {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct ProductRow {
    id: String,
    name: String,
    brand: String,
    url: String,
    store: String,
    country: String,
    currency: String,
    rule_json: String,
    created_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Result<Product> {
        Ok(Product {
            id: self.id,
            name: self.name,
            brand: self.brand,
            url: self.url,
            store: self.store,
            country: self.country,
            currency: self.currency,
            rule: serde_json::from_str(&self.rule_json)?,
            created_at: self.created_at,
        })
    }
}

const SELECT_PRODUCT: &str =
    "SELECT id, name, brand, url, store, country, currency, rule_json, created_at FROM products";

impl Store {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                brand TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                store TEXT NOT NULL,
                country TEXT NOT NULL,
                currency TEXT NOT NULL,
                rule_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS price_samples (
                id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL REFERENCES products(id),
                price REAL NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Registers a product with its extraction rule in one transaction.
    /// A duplicate name or URL rejects the whole registration and leaves
    /// the catalog unchanged.
    pub async fn register(&self, new_product: NewProduct) -> Result<Product> {
        let product = Product::new(new_product);
        let rule_json = serde_json::to_string(&product.rule)?;

        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT name FROM products WHERE name = ?1 OR url = ?2")
                .bind(&product.name)
                .bind(&product.url)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some((name,)) = existing {
            return Err(if name == product.name {
                EngineError::Duplicate(format!("name {:?} already registered", product.name))
            } else {
                EngineError::Duplicate(format!("URL {:?} already registered", product.url))
            });
        }

        sqlx::query(
            "INSERT INTO products (id, name, brand, url, store, country, currency, rule_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.url)
        .bind(&product.store)
        .bind(&product.country)
        .bind(&product.currency)
        .bind(&rule_json)
        .bind(product.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, &product))?;

        tx.commit().await?;

        debug!(product = %product.name, id = %product.id, "registered product");
        Ok(product)
    }

    /// All products in insertion order.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!("{SELECT_PRODUCT} ORDER BY rowid"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ProductRow::into_product).collect()
    }

    pub async fn product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("{SELECT_PRODUCT} WHERE name = ?1"))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ProductRow::into_product).transpose()
    }

    pub async fn product_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Appends one observed price. Never deduplicated: the same price at a
    /// later timestamp is a new row.
    pub async fn append_price(
        &self,
        product_id: &str,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<PriceSample> {
        let sample = PriceSample::new(product_id.to_string(), price, timestamp);

        sqlx::query("INSERT INTO price_samples (id, product_id, price, timestamp) VALUES (?1, ?2, ?3, ?4)")
            .bind(&sample.id)
            .bind(&sample.product_id)
            .bind(sample.price)
            .bind(sample.timestamp)
            .execute(&self.pool)
            .await?;

        Ok(sample)
    }

    /// The accumulated time series for one product, oldest first.
    pub async fn price_history(&self, product_id: &str) -> Result<Vec<PriceSample>> {
        let samples = sqlx::query_as::<_, PriceSample>(
            "SELECT id, product_id, price, timestamp FROM price_samples
             WHERE product_id = ?1 ORDER BY timestamp",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(samples)
    }
}

fn map_unique_violation(err: sqlx::Error, product: &Product) -> EngineError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return EngineError::Duplicate(format!(
                "name {:?} or URL {:?} already registered",
                product.name, product.url
            ));
        }
    }
    EngineError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ExtractionRule;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            // A shared pool against :memory: would open distinct databases
            // per connection.
            max_connections: 1,
        }
    }

    fn nutella() -> NewProduct {
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

    fn milk() -> NewProduct {
        NewProduct {
            name: "Milk 3.2%".to_string(),
            brand: "Łaciate".to_string(),
            url: "https://shop.example.pl/milk.p-41595".to_string(),
            store: "Auchan".to_string(),
            country: "Poland".to_string(),
            currency: "PLN".to_string(),
            rule: ExtractionRule::structured_data("price").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_register_and_list_round_trip() {
        let store = Store::connect(&memory_config()).await.unwrap();

        let registered = store.register(nutella()).await.unwrap();
        let listed = store.list_products().await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], registered);
        assert_eq!(listed[0].rule, ExtractionRule::css_text("#productDetails .price").unwrap());
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = Store::connect(&memory_config()).await.unwrap();

        store.register(nutella()).await.unwrap();
        store.register(milk()).await.unwrap();

        let listed = store.list_products().await.unwrap();
        assert_eq!(listed[0].name, "Nutella");
        assert_eq!(listed[1].name, "Milk 3.2%");
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let store = Store::connect(&memory_config()).await.unwrap();
        store.register(nutella()).await.unwrap();

        let mut duplicate = nutella();
        duplicate.name = "Nutella 400g".to_string();

        let result = store.register(duplicate).await;
        assert!(matches!(result, Err(EngineError::Duplicate(_))));
        assert_eq!(store.product_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let store = Store::connect(&memory_config()).await.unwrap();
        store.register(nutella()).await.unwrap();

        let mut duplicate = nutella();
        duplicate.url = "https://other.example.pl/nutella".to_string();

        let result = store.register(duplicate).await;
        assert!(matches!(result, Err(EngineError::Duplicate(_))));
        assert_eq!(store.product_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_product_by_name() {
        let store = Store::connect(&memory_config()).await.unwrap();
        store.register(nutella()).await.unwrap();

        let found = store.product_by_name("Nutella").await.unwrap();
        assert_eq!(found.unwrap().brand, "Ferrero");

        let missing = store.product_by_name("Butter").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_samples_accumulate_without_dedup() {
        let store = Store::connect(&memory_config()).await.unwrap();
        let product = store.register(nutella()).await.unwrap();

        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(3600);
        store.append_price(&product.id, 12.99, t1).await.unwrap();
        store.append_price(&product.id, 12.99, t2).await.unwrap();

        let history = store.price_history(&product.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].price, 12.99);
        assert_eq!(history[1].price, 12.99);
        assert_ne!(history[0].id, history[1].id);
        assert_ne!(history[0].timestamp, history[1].timestamp);
    }

    #[tokio::test]
    async fn test_history_ordered_by_timestamp() {
        let store = Store::connect(&memory_config()).await.unwrap();
        let product = store.register(nutella()).await.unwrap();

        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(3600);
        // Inserted newest first; history still comes back oldest first.
        store.append_price(&product.id, 13.49, t2).await.unwrap();
        store.append_price(&product.id, 12.99, t1).await.unwrap();

        let history = store.price_history(&product.id).await.unwrap();
        assert_eq!(history[0].price, 12.99);
        assert_eq!(history[1].price, 13.49);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("prices.db").display()),
            max_connections: 2,
        };

        {
            let store = Store::connect(&config).await.unwrap();
            store.register(nutella()).await.unwrap();
        }

        let reopened = Store::connect(&config).await.unwrap();
        assert_eq!(reopened.product_count().await.unwrap(), 1);
    }
}
