use anyhow::Result;

use crate::application::{ProductCatalog, RecommendationExplainer};
use crate::domain::{Product, RecommendationResult, RecommendationType, ShopperContext};

use super::super::Container;

const CLI_SESSION: &str = "cli";

pub struct RecommendationController<'a> {
    container: &'a Container,
    explainer: RecommendationExplainer,
}

impl<'a> RecommendationController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            container,
            explainer: RecommendationExplainer::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn similar(
        &self,
        product_id: i64,
        rec_type: String,
        num: Option<usize>,
        store_id: u32,
        customer: Option<i64>,
        cart: Vec<i64>,
        show_scores: bool,
    ) -> Result<String> {
        let rec_type: RecommendationType = rec_type.parse()?;
        if rec_type.is_personalized() {
            anyhow::bail!(
                "'{}' is a personalized type; use the `personalized` command instead",
                rec_type
            );
        }

        let source = self
            .container
            .catalog()
            .get_by_id(product_id, store_id)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!("Product {} not found in store {}", product_id, store_id)
            })?;

        let shopper = match customer {
            Some(id) => ShopperContext::customer(id),
            None => ShopperContext::guest(CLI_SESSION),
        }
        .with_cart(cart);

        let service = self.container.recommendation_service();
        let results = service
            .get_recommendations_with_scores(source.clone(), rec_type, num, store_id, &shopper)
            .await;

        Ok(self.format_results(&source, rec_type, &results, show_scores))
    }

    pub async fn search(&self, query: String, num: usize, store_id: u32) -> Result<String> {
        let service = self.container.recommendation_service();
        let products = service.similar_products_by_query(&query, num, store_id).await;
        Ok(format_products(&products))
    }

    fn format_results(
        &self,
        source: &Product,
        rec_type: RecommendationType,
        results: &[RecommendationResult],
        show_scores: bool,
    ) -> String {
        if results.is_empty() {
            return format!("No {} recommendations for {}.", rec_type, source.name);
        }

        let mut output = format!(
            "{} {} recommendations for {} [{}]:\n\n",
            results.len(),
            rec_type,
            source.name,
            source.sku
        );

        for (i, result) in results.iter().enumerate() {
            output.push_str(&format!(
                "{}. {} [{}] {:.2}",
                i + 1,
                result.product.name,
                result.product.sku,
                result.product.final_price()
            ));
            if show_scores {
                output.push_str(&format!(" (score: {:.3})", result.score));
            }
            output.push('\n');
            output.push_str(&format!("   {}\n", self.explainer.explain(source, result)));

            if show_scores {
                if let Some(reason) = result.metadata.get("llm_reason").and_then(|v| v.as_str()) {
                    output.push_str(&format!("   LLM: {}\n", reason));
                }
            }
        }

        output
    }
}

pub(super) fn format_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "No products found.".to_string();
    }

    let mut output = format!("Found {} products:\n\n", products.len());
    for (i, product) in products.iter().enumerate() {
        output.push_str(&format!(
            "{}. {} [{}] {:.2}\n",
            i + 1,
            product.name,
            product.sku,
            product.final_price()
        ));
        if let Some(category) = product.category_names.first() {
            output.push_str(&format!("   Category: {}\n", category));
        }
    }

    output
}
