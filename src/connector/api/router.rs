use anyhow::Result;

use crate::Commands;

use super::container::Container;
use super::controller::{
    ConnectionController, MaintenanceController, PersonalizedController, RecommendationController,
};

pub struct Router<'a> {
    recommendation_controller: RecommendationController<'a>,
    personalized_controller: PersonalizedController<'a>,
    connection_controller: ConnectionController<'a>,
    maintenance_controller: MaintenanceController<'a>,
}

impl<'a> Router<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            recommendation_controller: RecommendationController::new(container),
            personalized_controller: PersonalizedController::new(container),
            connection_controller: ConnectionController::new(container),
            maintenance_controller: MaintenanceController::new(container),
        }
    }

    pub async fn route(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Similar {
                product_id,
                rec_type,
                num,
                store,
                customer,
                cart,
                scores,
            } => {
                self.recommendation_controller
                    .similar(product_id, rec_type, num, store, customer, cart, scores)
                    .await
            }
            Commands::Search { query, num, store } => {
                self.recommendation_controller.search(query, num, store).await
            }
            Commands::Personalized {
                profile_type,
                customer,
                session,
                num,
                store,
                exclude,
            } => {
                self.personalized_controller
                    .personalized(profile_type, customer, session, num, store, exclude)
                    .await
            }
            Commands::TestConnection => self.connection_controller.test_connection().await,
            Commands::RefreshTrending { store, period_days } => {
                self.maintenance_controller
                    .refresh_trending(store, period_days)
                    .await
            }
            Commands::RefreshProfiles {
                max_age_hours,
                limit,
            } => {
                self.maintenance_controller
                    .refresh_profiles(max_age_hours, limit)
                    .await
            }
            Commands::ClearCache {
                product,
                customer,
                profile_type,
                all,
            } => {
                self.maintenance_controller
                    .clear_cache(product, customer, profile_type, all)
                    .await
            }
            Commands::CleanExpired => self.maintenance_controller.clean_expired().await,
        }
    }
}
