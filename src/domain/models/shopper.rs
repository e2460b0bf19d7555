use serde::{Deserialize, Serialize};

/// Who is asking for recommendations, and what they already hold.
///
/// Customer-scoped cache tiers and behavior signals key off `customer_id`;
/// guest browsing history keys off `session_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopperContext {
    pub customer_id: Option<i64>,
    pub session_id: Option<String>,
    pub customer_group_id: Option<u32>,
    pub cart_product_ids: Vec<i64>,
}

impl ShopperContext {
    pub fn guest(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn customer(customer_id: i64) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_group(mut self, group_id: u32) -> Self {
        self.customer_group_id = Some(group_id);
        self
    }

    pub fn with_cart(mut self, product_ids: Vec<i64>) -> Self {
        self.cart_product_ids = product_ids;
        self
    }

    pub fn is_logged_in(&self) -> bool {
        self.customer_id.is_some()
    }

    pub fn is_anonymous(&self) -> bool {
        self.customer_id.is_none() && self.session_id.is_none()
    }

    /// Marketing segment used in LLM prompts.
    pub fn segment(&self) -> &'static str {
        if self.customer_id.is_none() {
            return "guest";
        }
        match self.customer_group_id {
            Some(1) => "regular_customer",
            Some(2) => "wholesale_buyer",
            Some(3) => "retailer",
            _ => "standard_customer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments() {
        assert_eq!(ShopperContext::guest("s1").segment(), "guest");
        assert_eq!(ShopperContext::customer(5).segment(), "standard_customer");
        assert_eq!(ShopperContext::customer(5).with_group(2).segment(), "wholesale_buyer");
        assert_eq!(ShopperContext::customer(5).with_group(3).segment(), "retailer");
    }
}
