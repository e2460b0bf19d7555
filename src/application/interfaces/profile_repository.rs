use async_trait::async_trait;

use crate::domain::{CustomerProfile, DomainError, ProfileType};

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Upsert on (customer, type, store).
    async fn save(&self, profile: &CustomerProfile) -> Result<(), DomainError>;

    async fn find(
        &self,
        customer_id: i64,
        profile_type: ProfileType,
        store_id: u32,
    ) -> Result<Option<CustomerProfile>, DomainError>;

    /// Delete one customer's profiles, optionally narrowed to a type and store.
    async fn delete(
        &self,
        customer_id: i64,
        profile_type: Option<ProfileType>,
        store_id: Option<u32>,
    ) -> Result<usize, DomainError>;

    /// Profiles last updated before `updated_before`, oldest first.
    async fn find_stale(
        &self,
        updated_before: i64,
        limit: usize,
    ) -> Result<Vec<CustomerProfile>, DomainError>;
}
