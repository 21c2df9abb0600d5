//! Platform administration
//!
//! CRUD over the platform table plus the per-user enablement toggle. The
//! toggle is informational for front-end tooling; the dispatch path never
//! consults it.

use std::sync::Arc;

use crate::error::{Result, SyndicateError};
use crate::store::Store;
use crate::types::Platform;

pub struct PlatformService {
    store: Arc<Store>,
}

impl PlatformService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Create a platform. Display names are globally unique.
    pub async fn create(&self, name: &str, kind: &str) -> Result<Platform> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SyndicateError::InvalidInput(
                "Platform name is required".to_string(),
            ));
        }
        if self.store.find_platform_by_name(name).await?.is_some() {
            return Err(SyndicateError::InvalidInput(format!(
                "Platform name already exists: {}",
                name
            )));
        }

        let platform = Platform::new(name.to_string(), kind.to_string());
        self.store.create_platform(&platform).await?;
        Ok(platform)
    }

    pub async fn get(&self, platform_id: &str) -> Result<Option<Platform>> {
        self.store.get_platform(platform_id).await
    }

    pub async fn update(&self, platform_id: &str, name: &str, kind: &str) -> Result<Platform> {
        let mut platform = self.require(platform_id).await?;

        let name = name.trim();
        if name != platform.name {
            if self.store.find_platform_by_name(name).await?.is_some() {
                return Err(SyndicateError::InvalidInput(format!(
                    "Platform name already exists: {}",
                    name
                )));
            }
            platform.name = name.to_string();
        }
        platform.kind = kind.to_string();

        self.store.update_platform(&platform).await?;
        Ok(platform)
    }

    /// Returns false when the platform did not exist.
    pub async fn delete(&self, platform_id: &str) -> Result<bool> {
        self.store.delete_platform(platform_id).await
    }

    pub async fn list(&self) -> Result<Vec<Platform>> {
        self.store.list_platforms().await
    }

    /// All platforms with the user's enablement flag attached.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<(Platform, bool)>> {
        self.store.list_platforms_with_user_flag(user_id).await
    }

    pub async fn set_enabled(&self, user_id: i64, platform_id: &str, enabled: bool) -> Result<()> {
        self.require(platform_id).await?;
        self.store
            .set_user_platform(user_id, platform_id, enabled)
            .await
    }

    async fn require(&self, platform_id: &str) -> Result<Platform> {
        self.store
            .get_platform(platform_id)
            .await?
            .ok_or_else(|| {
                SyndicateError::InvalidInput(format!("Platform not found: {}", platform_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, PlatformService) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("test.db");
        let store = Arc::new(Store::new(db_path.to_str().unwrap()).await.unwrap());
        (tmp, PlatformService::new(store))
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (_tmp, service) = setup().await;

        service.create("Twitter", "twitter").await.unwrap();
        service.create("Company LinkedIn", "linkedin").await.unwrap();

        let platforms = service.list().await.unwrap();
        assert_eq!(platforms.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let (_tmp, service) = setup().await;

        service.create("Twitter", "twitter").await.unwrap();
        let err = service.create("Twitter", "linkedin").await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let (_tmp, service) = setup().await;
        assert!(service.create("   ", "twitter").await.is_err());
    }

    #[tokio::test]
    async fn test_update_checks_name_uniqueness() {
        let (_tmp, service) = setup().await;

        let a = service.create("A", "twitter").await.unwrap();
        service.create("B", "linkedin").await.unwrap();

        let err = service.update(&a.id, "B", "twitter").await.unwrap_err();
        assert!(err.to_string().contains("already exists"));

        // Keeping its own name while changing the kind is fine
        let updated = service.update(&a.id, "A", "instagram").await.unwrap();
        assert_eq!(updated.kind, "instagram");
    }

    #[tokio::test]
    async fn test_delete() {
        let (_tmp, service) = setup().await;

        let a = service.create("A", "twitter").await.unwrap();
        assert!(service.delete(&a.id).await.unwrap());
        assert!(!service.delete(&a.id).await.unwrap());
        assert!(service.get(&a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enablement_toggle() {
        let (_tmp, service) = setup().await;

        let a = service.create("A", "twitter").await.unwrap();
        service.set_enabled(1, &a.id, true).await.unwrap();

        let flags = service.list_for_user(1).await.unwrap();
        assert!(flags[0].1);

        service.set_enabled(1, &a.id, false).await.unwrap();
        let flags = service.list_for_user(1).await.unwrap();
        assert!(!flags[0].1);
    }

    #[tokio::test]
    async fn test_toggle_unknown_platform_rejected() {
        let (_tmp, service) = setup().await;
        assert!(service.set_enabled(1, "missing", true).await.is_err());
    }
}
