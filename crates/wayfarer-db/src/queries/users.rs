//! Database query functions for the `users` table.
//!
//! Every query selects columns explicitly: the `dashscope_api_key` column is
//! only ever fetched by [`get_dashscope_key`], so a stored key cannot leak
//! through a serialized [`User`].

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

const USER_COLUMNS: &str = "id, name, email, created_at, updated_at";

/// Insert a new user row. Returns the inserted user with server-generated
/// defaults (id, timestamps). Fails on a duplicate email.
pub async fn insert_user(pool: &PgPool, name: &str, email: &str) -> Result<User> {
    let query = format!(
        "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&query)
        .bind(name)
        .bind(email)
        .fetch_one(pool)
        .await
        .context("failed to insert user")?;

    Ok(user)
}

/// Fetch a user by ID.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let user = sqlx::query_as::<_, User>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user")?;

    Ok(user)
}

/// Fetch a user by email address.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let user = sqlx::query_as::<_, User>(&query)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by email")?;

    Ok(user)
}

/// List all users, ordered by creation time.
pub async fn list_users(pool: &PgPool) -> Result<Vec<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
    let users = sqlx::query_as::<_, User>(&query)
        .fetch_all(pool)
        .await
        .context("failed to list users")?;

    Ok(users)
}

/// Update a user's display name. Returns the updated user, or `None` when
/// the user does not exist.
pub async fn update_user_name(pool: &PgPool, id: Uuid, name: &str) -> Result<Option<User>> {
    let query = format!(
        "UPDATE users SET name = $2, updated_at = now() \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&query)
        .bind(id)
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("failed to update user name")?;

    Ok(user)
}

/// Store (or replace) a user's DashScope API key. Returns `false` when the
/// user does not exist.
pub async fn set_dashscope_key(pool: &PgPool, id: Uuid, api_key: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE users SET dashscope_api_key = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(api_key)
    .execute(pool)
    .await
    .context("failed to store api key")?;

    Ok(result.rows_affected() > 0)
}

/// Fetch a user's stored DashScope API key.
///
/// The outer `None` means the user does not exist; the inner `None` means
/// the user exists but has no key stored.
pub async fn get_dashscope_key(pool: &PgPool, id: Uuid) -> Result<Option<Option<String>>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT dashscope_api_key FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch stored api key")?;

    Ok(row.map(|(key,)| key))
}
