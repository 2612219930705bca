//! Site settings with a cached snapshot.
//!
//! Readers go through [`SettingsService::snapshot`], served from a `moka`
//! cache. Snapshots are cached under the write generation they were loaded
//! in, and every write through this service bumps it, so a load that raced a
//! write is never served to later readers. Writes made directly to the
//! database show up once the TTL expires.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;

use tasfiya_core::SettingType;

use crate::db::{RepositoryError, Storage};
use crate::error::AppError;
use crate::models::setting::validate_key;
use crate::models::{Setting, SettingInput, SettingsSnapshot};

/// Default category for a new key written without one.
const DEFAULT_CATEGORY: &str = "general";

#[derive(Clone)]
pub struct SettingsService {
    cache: Cache<u64, Arc<SettingsSnapshot>>,
    generation: Arc<AtomicU64>,
}

impl SettingsService {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(2).time_to_live(ttl).build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cache a snapshot loaded while `generation` was current.
    async fn remember(&self, generation: u64, snapshot: Arc<SettingsSnapshot>) {
        self.cache.insert(generation, snapshot).await;
    }

    /// Call after a write has been stored.
    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate_all();
    }

    /// Current settings, loading them on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the settings cannot be loaded.
    pub async fn snapshot(
        &self,
        storage: &dyn Storage,
    ) -> Result<Arc<SettingsSnapshot>, RepositoryError> {
        let generation = self.generation();
        if let Some(snapshot) = self.cache.get(&generation).await {
            return Ok(snapshot);
        }
        let snapshot = Arc::new(SettingsSnapshot::new(storage.list_settings().await?));
        self.remember(generation, Arc::clone(&snapshot)).await;
        Ok(snapshot)
    }

    /// Validate and store a setting.
    ///
    /// Omitted category and type keep the stored ones; a new key defaults to
    /// `general`/`text`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed key or a value that does
    /// not fit the type.
    pub async fn put(
        &self,
        storage: &dyn Storage,
        key: &str,
        input: SettingInput,
    ) -> Result<Setting, AppError> {
        validate_key(key).map_err(AppError::BadRequest)?;

        let existing = storage.get_setting(key).await?;
        let setting_type = input
            .setting_type
            .or_else(|| existing.as_ref().map(|s| s.setting_type))
            .unwrap_or(SettingType::Text);
        let category = input
            .category
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .or_else(|| existing.map(|s| s.category))
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());

        setting_type
            .validate(&input.value)
            .map_err(AppError::BadRequest)?;

        let setting = storage
            .upsert_setting(key, &input.value, &category, setting_type)
            .await?;
        self.invalidate();

        tracing::info!(key, category = %setting.category, "Setting updated");
        Ok(setting)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the key does not exist.
    pub async fn delete(&self, storage: &dyn Storage, key: &str) -> Result<(), RepositoryError> {
        storage.delete_setting(key).await?;
        self.invalidate();
        tracing::info!(key, "Setting deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{MemoryStorage, SettingsRepository};
    use crate::models::setting::keys;

    fn input(value: &str, setting_type: Option<SettingType>) -> SettingInput {
        SettingInput {
            value: value.to_owned(),
            category: None,
            setting_type,
        }
    }

    #[tokio::test]
    async fn test_write_invalidates_snapshot() {
        let storage = MemoryStorage::new();
        let service = SettingsService::new(Duration::from_secs(300));

        let before = service.snapshot(&storage).await.unwrap();
        assert!(before.get_bool(keys::CHECKOUT_ENABLED, true));

        service
            .put(
                &storage,
                keys::CHECKOUT_ENABLED,
                input("false", Some(SettingType::Boolean)),
            )
            .await
            .unwrap();

        let after = service.snapshot(&storage).await.unwrap();
        assert!(!after.get_bool(keys::CHECKOUT_ENABLED, true));
    }

    #[tokio::test]
    async fn test_load_racing_a_write_is_not_served() {
        let storage = MemoryStorage::new();
        let service = SettingsService::new(Duration::from_secs(300));

        // A reader loads rows, then a write lands before it caches them.
        let generation = service.generation();
        let stale = Arc::new(SettingsSnapshot::new(storage.list_settings().await.unwrap()));
        service
            .put(
                &storage,
                keys::AUCTIONS_ENABLED,
                input("false", Some(SettingType::Boolean)),
            )
            .await
            .unwrap();
        service.remember(generation, stale).await;

        let current = service.snapshot(&storage).await.unwrap();
        assert!(!current.get_bool(keys::AUCTIONS_ENABLED, true));
    }

    #[tokio::test]
    async fn test_value_checked_against_type() {
        let storage = MemoryStorage::new();
        let service = SettingsService::new(Duration::from_secs(300));

        let err = service
            .put(&storage, "slot_capacity", input("lots", Some(SettingType::Number)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        service
            .put(&storage, "store_name", input("Tasfiya", None))
            .await
            .unwrap();
        // The stored type applies when none is given.
        service
            .put(&storage, "hero_count", input("3", Some(SettingType::Number)))
            .await
            .unwrap();
        assert!(
            service
                .put(&storage, "hero_count", input("three", None))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_new_key_defaults() {
        let storage = MemoryStorage::new();
        let service = SettingsService::new(Duration::from_secs(300));
        let setting = service
            .put(&storage, "banner_text", input("Sale!", None))
            .await
            .unwrap();
        assert_eq!(setting.category, "general");
        assert_eq!(setting.setting_type, SettingType::Text);
    }
}
