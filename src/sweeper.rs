use chrono::Utc;
use tracing::{error, info};

use crate::models::Product;
use crate::parser;
use crate::retry::{RetryPolicy, run_with_backoff};
use crate::session::{PageSession, Renderer};
use crate::store::Store;
use crate::utils::error::{EngineError, Result};

/// Receives per-product notices during a sweep. The command dispatcher is
/// one implementation; tests collect the notices instead.
pub trait Reporter: Send {
    fn nothing_to_do(&mut self);
    fn price_fetched(&mut self, product: &Product, price: f64);
    fn fetch_failed(&mut self, product: &Product, error: &EngineError);
}

/// Prints notices in the shape the chat bot used to reply with.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn nothing_to_do(&mut self) {
        println!("No products registered, nothing to do");
    }

    fn price_fetched(&mut self, product: &Product, price: f64) {
        println!(
            "Fetched price {} {} for product {}",
            price, product.currency, product.name
        );
    }

    fn fetch_failed(&mut self, product: &Product, error: &EngineError) {
        println!("Error fetching price for {}: {}", product.name, error);
    }
}

pub struct SweepOutcome {
    pub product: Product,
    pub result: Result<f64>,
}

/// Drives one full sweep over the catalog: a single rendering session is
/// opened, each product's page is loaded and its rule run through the
/// retrying extractor, and every parsed price is appended to storage in
/// catalog order. One product exhausting its retry budget never aborts
/// the rest of the sweep.
pub struct Sweeper<R: Renderer> {
    store: Store,
    renderer: R,
    policy: RetryPolicy,
}

impl<R: Renderer> Sweeper<R> {
    pub fn new(store: Store, renderer: R, policy: RetryPolicy) -> Self {
        Self {
            store,
            renderer,
            policy,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn sweep(&self, reporter: &mut dyn Reporter) -> Result<Vec<SweepOutcome>> {
        let products = self.store.list_products().await?;

        if products.is_empty() {
            info!("no products registered");
            reporter.nothing_to_do();
            return Ok(Vec::new());
        }

        // Session acquisition failure is the one fatal condition: it
        // aborts before any product is processed.
        let mut session = self.renderer.open().await?;
        let mut outcomes = Vec::with_capacity(products.len());

        for product in products {
            info!(product = %product.name, url = %product.url, "fetching price");

            let result = self.fetch_one(session.as_mut(), &product).await;
            match &result {
                Ok(price) => {
                    self.store
                        .append_price(&product.id, *price, Utc::now())
                        .await?;
                    info!(product = %product.name, price = *price, "price recorded");
                    reporter.price_fetched(&product, *price);
                }
                Err(err) => {
                    error!(product = %product.name, "price fetch failed: {err}");
                    reporter.fetch_failed(&product, err);
                }
            }

            outcomes.push(SweepOutcome { product, result });
        }

        Ok(outcomes)
    }

    /// One retrying extraction. The page is loaded once; only a failed
    /// load is repeated on the next attempt, so a slow page gets its
    /// rule re-run against the already-loaded document.
    async fn fetch_one(&self, session: &mut dyn PageSession, product: &Product) -> Result<f64> {
        let mut loaded = false;

        run_with_backoff(&self.policy, &product.name, async || {
            if !loaded {
                session.load(&product.url).await?;
                loaded = true;
            }
            let raw = product.rule.extract(&mut *session).await?;
            parser::parse(raw.as_deref())
        })
        .await
    }
}
