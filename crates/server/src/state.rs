//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::{RepositoryError, Storage};
use crate::models::SettingsSnapshot;
use crate::services::notifications::{NotificationHub, Notifier};
use crate::services::settings::SettingsService;
use crate::services::sms::{SmsGateway, SmsService};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; holds the storage backend, the settings
/// cache, the notification hub and the SMS gateway.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    storage: Arc<dyn Storage>,
    settings: SettingsService,
    hub: NotificationHub,
    sms_gateway: Arc<dyn SmsGateway>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: ServerConfig,
        storage: Arc<dyn Storage>,
        sms_gateway: Arc<dyn SmsGateway>,
    ) -> Self {
        let settings = SettingsService::new(config.settings_cache_ttl);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                settings,
                hub: NotificationHub::new(),
                sms_gateway,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn storage(&self) -> &dyn Storage {
        self.inner.storage.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsService {
        &self.inner.settings
    }

    #[must_use]
    pub fn hub(&self) -> &NotificationHub {
        &self.inner.hub
    }

    /// Current settings through the cache.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on a cache miss that fails to load.
    pub async fn settings_snapshot(&self) -> Result<Arc<SettingsSnapshot>, RepositoryError> {
        self.inner.settings.snapshot(self.storage()).await
    }

    #[must_use]
    pub fn notifier(&self) -> Notifier<'_> {
        Notifier::new(self.storage(), &self.inner.hub)
    }

    #[must_use]
    pub fn sms(&self) -> SmsService<'_> {
        SmsService::new(
            self.storage(),
            self.inner.sms_gateway.as_ref(),
            &self.inner.settings,
        )
    }
}
