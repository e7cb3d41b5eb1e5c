use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;

use shelfwatch::config::AppConfig;
use shelfwatch::models::NewProduct;
use shelfwatch::rules::ExtractionRule;
use shelfwatch::session::ChromeRenderer;
use shelfwatch::store::Store;
use shelfwatch::sweeper::{ConsoleReporter, Sweeper};

#[derive(Parser)]
#[command(name = "shelfwatch", about = "Tracks retail product prices over time")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a product with its price extraction rule
    Add {
        name: String,
        #[arg(long)]
        brand: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        store: String,
        #[arg(long)]
        country: String,
        #[arg(long)]
        currency: String,
        /// CSS selector whose inner text holds the price
        #[arg(long)]
        selector: Option<String>,
        /// Read this attribute instead of inner text (with --selector)
        #[arg(long)]
        attribute: Option<String>,
        /// JSON-LD offer property to read, e.g. "price"
        #[arg(long)]
        structured_data: Option<String>,
        /// Raw script evaluated in the page (escape hatch)
        #[arg(long)]
        script: Option<String>,
    },
    /// Fetch the current price for every registered product
    Sweep,
    /// List registered products
    List,
    /// Show the recorded price history for one product
    History { name: String },
}

fn build_rule(
    selector: Option<String>,
    attribute: Option<String>,
    structured_data: Option<String>,
    script: Option<String>,
) -> Result<ExtractionRule> {
    let rule = match (selector, attribute, structured_data, script) {
        (Some(selector), None, None, None) => ExtractionRule::css_text(&selector)?,
        (Some(selector), Some(attribute), None, None) => {
            ExtractionRule::attribute(&selector, &attribute)?
        }
        (None, None, Some(property), None) => ExtractionRule::structured_data(&property)?,
        (None, None, None, Some(source)) => ExtractionRule::script(&source),
        _ => {
            return Err(anyhow!(
                "provide exactly one of --selector (optionally with --attribute), \
                 --structured-data, or --script"
            ));
        }
    };
    Ok(rule)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelfwatch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let store = Store::connect(&config.database).await?;

    match cli.command {
        Command::Add {
            name,
            brand,
            url,
            store: store_name,
            country,
            currency,
            selector,
            attribute,
            structured_data,
            script,
        } => {
            url::Url::parse(&url).map_err(|e| anyhow!("invalid URL {url:?}: {e}"))?;
            let rule = build_rule(selector, attribute, structured_data, script)?;

            let product = store
                .register(NewProduct {
                    name,
                    brand,
                    url,
                    store: store_name,
                    country,
                    currency,
                    rule,
                })
                .await?;
            println!("Added product '{}' with ID {}", product.name, product.id);
        }
        Command::Sweep => {
            info!("starting sweep");
            let renderer = ChromeRenderer::new(config.browser.clone());
            let sweeper = Sweeper::new(store, renderer, config.retry.policy());

            let mut reporter = ConsoleReporter;
            let outcomes = sweeper.sweep(&mut reporter).await?;
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            info!(
                products = outcomes.len(),
                failed, "sweep finished"
            );
        }
        Command::List => {
            for product in store.list_products().await? {
                println!(
                    "{}  {} [{}] {} ({}, {})",
                    product.id, product.name, product.brand, product.url, product.store, product.country
                );
            }
        }
        Command::History { name } => match store.product_by_name(&name).await? {
            None => println!("No product named '{name}'"),
            Some(product) => {
                let history = store.price_history(&product.id).await?;
                if history.is_empty() {
                    println!("No prices recorded for '{}'", product.name);
                }
                for sample in history {
                    println!(
                        "{}  {} {}",
                        sample.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        sample.price,
                        product.currency
                    );
                }
            }
        },
    }

    Ok(())
}
