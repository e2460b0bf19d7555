use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A catalog product as seen by the recommendation core.
///
/// Core fields are typed; open-ended catalog attributes (brand, color,
/// keywords, ...) live in `attributes` keyed by attribute code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub price: f64,
    pub special_price: Option<f64>,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub category_ids: Vec<i64>,
    pub category_names: Vec<String>,
    pub attributes: HashMap<String, String>,
    pub store_id: u32,
    pub enabled: bool,
    pub visible: bool,
    pub in_stock: bool,
}

impl Product {
    pub fn new(id: i64, sku: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id,
            sku: sku.into(),
            name: name.into(),
            price,
            special_price: None,
            short_description: None,
            description: None,
            category_ids: Vec::new(),
            category_names: Vec::new(),
            attributes: HashMap::new(),
            store_id: 1,
            enabled: true,
            visible: true,
            in_stock: true,
        }
    }

    pub fn with_special_price(mut self, price: f64) -> Self {
        self.special_price = Some(price);
        self
    }

    pub fn with_short_description(mut self, text: impl Into<String>) -> Self {
        self.short_description = Some(text.into());
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn with_category(mut self, id: i64, name: impl Into<String>) -> Self {
        self.category_ids.push(id);
        self.category_names.push(name.into());
        self
    }

    pub fn with_attribute(mut self, code: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(code.into(), value.into());
        self
    }

    pub fn with_store(mut self, store_id: u32) -> Self {
        self.store_id = store_id;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = in_stock;
        self
    }

    /// Resolve an attribute by code, covering both typed fields and the bag.
    pub fn attribute(&self, code: &str) -> Option<&str> {
        let value = match code {
            "name" => Some(self.name.as_str()),
            "sku" => Some(self.sku.as_str()),
            "short_description" => self.short_description.as_deref(),
            "description" => self.description.as_deref(),
            other => self.attributes.get(other).map(String::as_str),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    pub fn brand(&self) -> Option<&str> {
        self.attribute("manufacturer")
    }

    pub fn color(&self) -> Option<&str> {
        self.attribute("color")
    }

    pub fn primary_category_id(&self) -> Option<i64> {
        self.category_ids.first().copied().filter(|id| *id > 0)
    }

    pub fn primary_category_name(&self) -> &str {
        self.category_names
            .first()
            .map(String::as_str)
            .unwrap_or("Uncategorized")
    }

    pub fn has_discount(&self) -> bool {
        matches!(self.special_price, Some(sp) if sp > 0.0 && sp < self.price)
    }

    /// Price a shopper actually pays.
    pub fn final_price(&self) -> f64 {
        match self.special_price {
            Some(sp) if self.has_discount() => sp,
            _ => self.price,
        }
    }

    /// Whole-number discount percentage, zero when not discounted.
    pub fn discount_percentage(&self) -> u32 {
        if !self.has_discount() || self.price <= 0.0 {
            return 0;
        }
        ((self.price - self.final_price()) / self.price * 100.0).round() as u32
    }

    pub fn is_salable(&self) -> bool {
        self.enabled && self.visible && self.in_stock
    }
}

impl AsRef<Product> for Product {
    fn as_ref(&self) -> &Product {
        self
    }
}

/// How a caller identifies the source product of a recommendation request.
#[derive(Debug, Clone)]
pub enum ProductLookup {
    Id(i64),
    Product(Product),
}

impl From<i64> for ProductLookup {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<Product> for ProductLookup {
    fn from(product: Product) -> Self {
        Self::Product(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_percentage_is_rounded() {
        let product = Product::new(1, "SKU-1", "Lamp", 30.0).with_special_price(20.0);
        assert!(product.has_discount());
        assert_eq!(product.final_price(), 20.0);
        assert_eq!(product.discount_percentage(), 33);
    }

    #[test]
    fn test_special_price_above_price_is_not_a_discount() {
        let product = Product::new(1, "SKU-1", "Lamp", 30.0).with_special_price(35.0);
        assert!(!product.has_discount());
        assert_eq!(product.final_price(), 30.0);
        assert_eq!(product.discount_percentage(), 0);
    }

    #[test]
    fn test_attribute_lookup_skips_blank_values() {
        let product = Product::new(1, "SKU-1", "Lamp", 30.0)
            .with_attribute("manufacturer", "Acme")
            .with_attribute("color", "  ");
        assert_eq!(product.brand(), Some("Acme"));
        assert_eq!(product.color(), None);
        assert_eq!(product.attribute("name"), Some("Lamp"));
    }

    #[test]
    fn test_primary_category_defaults() {
        let bare = Product::new(1, "SKU-1", "Lamp", 30.0);
        assert_eq!(bare.primary_category_id(), None);
        assert_eq!(bare.primary_category_name(), "Uncategorized");

        let lit = bare.with_category(7, "Lighting");
        assert_eq!(lit.primary_category_id(), Some(7));
        assert_eq!(lit.primary_category_name(), "Lighting");
    }
}
