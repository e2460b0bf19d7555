use anyhow::Result;

use crate::application::RecommendationExplainer;
use crate::domain::{ProfileType, ShopperContext};

use super::recommendation_controller::format_products;
use super::super::Container;

pub struct PersonalizedController<'a> {
    container: &'a Container,
}

impl<'a> PersonalizedController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn personalized(
        &self,
        profile_type: String,
        customer: Option<i64>,
        session: Option<String>,
        num: Option<usize>,
        store_id: u32,
        exclude: Vec<i64>,
    ) -> Result<String> {
        let profile_type: ProfileType = profile_type.parse()?;
        let shopper = match (customer, session) {
            (Some(id), Some(session)) => ShopperContext::customer(id).with_session(session),
            (Some(id), None) => ShopperContext::customer(id),
            (None, Some(session)) => ShopperContext::guest(session),
            (None, None) => anyhow::bail!("Either --customer or --session is required"),
        };

        let service = self.container.personalized_service();
        if !service.has_enough_data(&shopper, profile_type, store_id).await {
            return Ok(format!(
                "Not enough {} history for this shopper yet.",
                profile_type
            ));
        }

        let products = match profile_type {
            ProfileType::Browsing => {
                service
                    .browsing_inspired(&shopper, num, store_id, &exclude)
                    .await
            }
            ProfileType::Purchase => {
                service
                    .purchase_inspired(&shopper, num, store_id, &exclude)
                    .await
            }
            ProfileType::Wishlist => {
                service
                    .wishlist_inspired(&shopper, num, store_id, &exclude)
                    .await
            }
            ProfileType::JustForYou => {
                service.just_for_you(&shopper, num, store_id, &exclude).await
            }
        };

        let heading = RecommendationExplainer::new().explain_personalized(profile_type);
        Ok(format!("{}\n\n{}", heading, format_products(&products)))
    }
}
