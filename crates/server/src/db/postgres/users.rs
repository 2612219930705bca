//! Users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tasfiya_core::{Email, Phone, UserId, UserRole};

use super::{PgStorage, unique_violation};
use crate::db::{RepositoryError, UserRepository};
use crate::models::{NewUser, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    phone: Phone,
    email: Option<Email>,
    role: UserRole,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            phone: r.phone,
            email: r.email,
            role: r.role,
            password_hash: r.password_hash,
            created_at: r.created_at,
        }
    }
}

#[async_trait]
impl UserRepository for PgStorage {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(
            r"
            INSERT INTO users (name, phone, email, role, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, phone, email, role, password_hash, created_at
            ",
        )
        .bind(&user.name)
        .bind(user.phone.as_str())
        .bind(user.email.as_ref().map(Email::as_str))
        .bind(user.role)
        .bind(&user.password_hash)
        .fetch_one(self.pool())
        .await
        .map_err(|e| unique_violation(e, "phone number is already registered"))?;

        Ok(row.into())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, name, phone, email, role, password_hash, created_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_user_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            r"
            SELECT id, name, phone, email, role, password_hash, created_at
            FROM users
            WHERE phone = $1
            ",
        )
        .bind(phone.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn admin_ids(&self) -> Result<Vec<UserId>, RepositoryError> {
        let ids: Vec<UserId> = sqlx::query_scalar("SELECT id FROM users WHERE role = $1")
            .bind(UserRole::Admin)
            .fetch_all(self.pool())
            .await?;
        Ok(ids)
    }
}
