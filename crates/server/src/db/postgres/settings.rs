//! Site settings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tasfiya_core::SettingType;

use super::PgStorage;
use crate::db::{RepositoryError, SettingsRepository};
use crate::models::Setting;

#[derive(sqlx::FromRow)]
struct SettingRow {
    key: String,
    value: String,
    category: String,
    setting_type: SettingType,
    updated_at: DateTime<Utc>,
}

impl From<SettingRow> for Setting {
    fn from(r: SettingRow) -> Self {
        Self {
            key: r.key,
            value: r.value,
            category: r.category,
            setting_type: r.setting_type,
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
impl SettingsRepository for PgStorage {
    async fn list_settings(&self) -> Result<Vec<Setting>, RepositoryError> {
        let rows: Vec<SettingRow> = sqlx::query_as(
            "SELECT key, value, category, type AS setting_type, updated_at FROM settings ORDER BY key",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Setting>, RepositoryError> {
        let row: Option<SettingRow> = sqlx::query_as(
            "SELECT key, value, category, type AS setting_type, updated_at FROM settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn upsert_setting(
        &self,
        key: &str,
        value: &str,
        category: &str,
        setting_type: SettingType,
    ) -> Result<Setting, RepositoryError> {
        let row: SettingRow = sqlx::query_as(
            r"
            INSERT INTO settings (key, value, category, type)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, category = EXCLUDED.category, type = EXCLUDED.type,
                    updated_at = NOW()
            RETURNING key, value, category, type AS setting_type, updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(category)
        .bind(setting_type)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn delete_setting(&self, key: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
