use std::sync::LazyLock;

use regex::Regex;

use crate::application::TextConfig;
use crate::domain::Product;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip markup, decode common entities and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let without_tags = HTML_TAG.replace_all(raw, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

/// Builds the text that represents a product in embedding space.
#[derive(Debug, Clone)]
pub struct ProductTextBuilder {
    attributes: Vec<String>,
    include_categories: bool,
}

impl ProductTextBuilder {
    pub fn new(config: &TextConfig) -> Self {
        Self {
            attributes: config.product_attributes.clone(),
            include_categories: config.include_categories,
        }
    }

    pub fn build(&self, product: &Product) -> String {
        let mut parts: Vec<String> = self
            .attributes
            .iter()
            .filter_map(|code| product.attribute(code))
            .map(clean_text)
            .filter(|text| !text.is_empty())
            .collect();

        if self.include_categories {
            let names: Vec<&str> = product
                .category_names
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .collect();
            if !names.is_empty() {
                parts.push(format!("Categories: {}", names.join(", ")));
            }
        }

        parts.join(". ")
    }
}

impl Default for ProductTextBuilder {
    fn default() -> Self {
        Self::new(&TextConfig::default())
    }
}
