use anyhow::Result;
use tracing::info;

use crate::application::StoreDirectory;
use crate::domain::ProfileType;

use super::super::Container;

pub struct MaintenanceController<'a> {
    container: &'a Container,
}

impl<'a> MaintenanceController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn refresh_trending(
        &self,
        store: Option<u32>,
        period_days: Option<u32>,
    ) -> Result<String> {
        let store_ids = match store {
            Some(store_id) => vec![store_id],
            None => self.container.catalog().store_ids().await?,
        };
        let period_days =
            period_days.unwrap_or(self.container.settings().ranking.trending_period_days);

        let booster = self.container.trending_booster();
        let mut output = format!("Trending scores ({} day window):\n", period_days);
        for store_id in store_ids {
            let count = booster.refresh(store_id, period_days).await?;
            output.push_str(&format!("  Store {}: {} products\n", store_id, count));
        }
        Ok(output)
    }

    pub async fn refresh_profiles(
        &self,
        max_age_hours: Option<i64>,
        limit: Option<usize>,
    ) -> Result<String> {
        let refreshed = self
            .container
            .personalized_service()
            .refresh_stale_profiles(max_age_hours, limit)
            .await?;
        Ok(format!("Refreshed {} customer profiles.", refreshed))
    }

    pub async fn clear_cache(
        &self,
        product: Option<i64>,
        customer: Option<i64>,
        profile_type: Option<String>,
        all: bool,
    ) -> Result<String> {
        if all {
            let service = self.container.recommendation_service();
            let removed = service.clear_all_cache().await?;
            return Ok(format!("Removed {} cached recommendation entries.", removed));
        }

        if let Some(product_id) = product {
            self.container
                .recommendation_service()
                .clear_cache(product_id)
                .await?;
            return Ok(format!("Cleared recommendations for product {}.", product_id));
        }

        if let Some(customer_id) = customer {
            let profile_type = profile_type
                .map(|t| t.parse::<ProfileType>())
                .transpose()?;
            let removed = self
                .container
                .personalized_service()
                .clear_cache(customer_id, profile_type)
                .await?;
            return Ok(format!(
                "Removed {} personalized cache entries for customer {}.",
                removed, customer_id
            ));
        }

        anyhow::bail!("Nothing to clear: pass --product, --customer or --all")
    }

    pub async fn clean_expired(&self) -> Result<String> {
        let rankings = self.container.rankings().delete_expired().await?;
        let personalized = self
            .container
            .personalized_service()
            .delete_expired_cache()
            .await?;
        info!(rankings, personalized, "Expired recommendation data removed");
        Ok(format!(
            "Deleted {} expired ranking records and {} expired personalized cache entries.",
            rankings, personalized
        ))
    }
}
