use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::session::PageSession;
use crate::utils::error::{EngineError, Result};

/// How to find the price on a product page. A closed set of strategies,
/// each rendered to a read-only script evaluated in the page, with the
/// raw-script form kept as an escape hatch for pages none of the
/// structured variants can reach.
///
/// Exactly one rule is bound per product, at registration time, and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionRule {
    /// Inner text of the first element matching a CSS selector.
    CssText { selector: String },
    /// An attribute value read from the first element matching a CSS
    /// selector, e.g. `content` on a meta price tag.
    Attribute { selector: String, attribute: String },
    /// A property looked up on the first JSON-LD offer block, e.g. `price`.
    StructuredData { property: String },
    /// Opaque script evaluated verbatim. The engine does not interpret or
    /// validate its contents.
    Script { source: String },
}

impl ExtractionRule {
    pub fn css_text(selector: &str) -> Result<Self> {
        validate_selector(selector)?;
        Ok(Self::CssText {
            selector: selector.to_string(),
        })
    }

    pub fn attribute(selector: &str, attribute: &str) -> Result<Self> {
        validate_selector(selector)?;
        if attribute.is_empty() || !attribute.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(EngineError::Rule(format!("invalid attribute name: {attribute:?}")));
        }
        Ok(Self::Attribute {
            selector: selector.to_string(),
            attribute: attribute.to_string(),
        })
    }

    pub fn structured_data(property: &str) -> Result<Self> {
        if property.is_empty() || !property.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(EngineError::Rule(format!("invalid property name: {property:?}")));
        }
        Ok(Self::StructuredData {
            property: property.to_string(),
        })
    }

    pub fn script(source: &str) -> Self {
        Self::Script {
            source: source.to_string(),
        }
    }

    /// Renders the script to evaluate in the page. Structured variants
    /// return the target text or `null` when nothing matches, so an
    /// element that has not rendered yet surfaces as an absent result
    /// rather than a thrown error.
    pub fn to_script(&self) -> String {
        match self {
            Self::CssText { selector } => {
                let quoted = quote_js(selector);
                format!(
                    "(() => {{ const el = document.querySelector({quoted}); \
                     return el ? el.innerText : null; }})()"
                )
            }
            Self::Attribute { selector, attribute } => {
                let quoted_selector = quote_js(selector);
                let quoted_attribute = quote_js(attribute);
                format!(
                    "(() => {{ const el = document.querySelector({quoted_selector}); \
                     return el ? el.getAttribute({quoted_attribute}) : null; }})()"
                )
            }
            Self::StructuredData { property } => {
                let quoted = quote_js(property);
                format!(
                    "(() => {{ \
                     for (const el of document.querySelectorAll('script[type=\"application/ld+json\"]')) {{ \
                       try {{ \
                         const data = JSON.parse(el.textContent); \
                         for (const node of Array.isArray(data) ? data : [data]) {{ \
                           const offers = node.offers; \
                           if (!offers) continue; \
                           const offer = Array.isArray(offers) ? offers[0] : offers; \
                           if (offer && offer[{quoted}] !== undefined) return String(offer[{quoted}]); \
                         }} \
                       }} catch (e) {{}} \
                     }} \
                     return null; }})()"
                )
            }
            Self::Script { source } => source.clone(),
        }
    }

    /// Runs the rule against the active session, positioned at the
    /// product's URL. Read-only; must not mutate the page.
    pub async fn extract(&self, session: &mut dyn PageSession) -> Result<Option<String>> {
        session.evaluate(&self.to_script()).await
    }
}

fn validate_selector(selector: &str) -> Result<()> {
    Selector::parse(selector)
        .map_err(|e| EngineError::Selector(format!("{selector:?}: {e:?}")))?;
    Ok(())
}

fn quote_js(value: &str) -> String {
    // JSON string escaping is valid JS string escaping.
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
